use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    github::PullRequest,
    health::{Assessment, Finding},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub url: String,
    pub age_days: i64,
    pub idle_days: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl Entry {
    fn new(pr: &PullRequest, assessment: &Assessment) -> Self {
        Self {
            number: pr.number,
            title: pr.title.clone(),
            author: pr.author().to_owned(),
            url: pr.html_url.clone(),
            age_days: assessment.age_days,
            idle_days: assessment.idle_days,
            labels: assessment.blocking_labels.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoAssignment {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub assignees: Vec<String>,
}

/// The categorized outcome of one monitoring pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub repository: String,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub healthy: usize,
    pub stale: Vec<Entry>,
    pub old: Vec<Entry>,
    pub blocked: Vec<Entry>,
    pub unassigned: Vec<Entry>,
    pub awaiting_review: Vec<Entry>,
    pub auto_assigned: Vec<AutoAssignment>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn new(repository: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            repository: repository.into(),
            generated_at,
            total: 0,
            healthy: 0,
            stale: Vec::new(),
            old: Vec::new(),
            blocked: Vec::new(),
            unassigned: Vec::new(),
            awaiting_review: Vec::new(),
            auto_assigned: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// File a pull request under each of its findings.
    pub fn record(&mut self, pr: &PullRequest, assessment: &Assessment) {
        self.total += 1;
        if assessment.is_healthy() {
            self.healthy += 1;
            return;
        }
        for &finding in &assessment.findings {
            self.category_mut(finding).push(Entry::new(pr, assessment));
        }
    }

    pub fn record_assignment(&mut self, pr: &PullRequest, assignees: Vec<String>) {
        self.auto_assigned.push(AutoAssignment {
            number: pr.number,
            title: pr.title.clone(),
            url: pr.html_url.clone(),
            assignees,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn category(&self, finding: Finding) -> &[Entry] {
        match finding {
            Finding::Stale => &self.stale,
            Finding::Old => &self.old,
            Finding::Blocked => &self.blocked,
            Finding::Unassigned => &self.unassigned,
            Finding::AwaitingReview => &self.awaiting_review,
        }
    }

    fn category_mut(&mut self, finding: Finding) -> &mut Vec<Entry> {
        match finding {
            Finding::Stale => &mut self.stale,
            Finding::Old => &mut self.old,
            Finding::Blocked => &mut self.blocked,
            Finding::Unassigned => &mut self.unassigned,
            Finding::AwaitingReview => &mut self.awaiting_review,
        }
    }

    pub fn has_findings(&self) -> bool {
        Finding::ALL.iter().any(|&f| !self.category(f).is_empty())
    }

    /// One line per non-empty category, suitable for a chat message.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "PR health for {}: {} open, {} healthy",
            self.repository, self.total, self.healthy
        );
        for finding in Finding::ALL {
            let entries = self.category(finding);
            if !entries.is_empty() {
                let _ = write!(out, "\n{}: {}", finding.title(), entries.len());
            }
        }
        if !self.auto_assigned.is_empty() {
            let _ = write!(out, "\nAuto-assigned: {}", self.auto_assigned.len());
        }
        out
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}: {} open pull requests, {} healthy ({})",
            self.repository,
            self.total,
            self.healthy,
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        for finding in Finding::ALL {
            let entries = self.category(finding);
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{} ({})", finding.title(), entries.len());
            for entry in entries {
                let _ = writeln!(
                    out,
                    "  #{:<6} {:<50} @{:<16} {}d old, idle {}d{}",
                    entry.number,
                    truncate(&entry.title, 50),
                    entry.author,
                    entry.age_days,
                    entry.idle_days,
                    label_suffix(&entry.labels)
                );
            }
        }
        if !self.auto_assigned.is_empty() {
            let _ = writeln!(out, "\nAuto-assigned ({})", self.auto_assigned.len());
            for assignment in &self.auto_assigned {
                let _ = writeln!(
                    out,
                    "  #{:<6} {}",
                    assignment.number,
                    assignment.assignees.join(" ")
                );
            }
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings");
            for warning in &self.warnings {
                let _ = writeln!(out, "  {}", warning);
            }
        }
        out
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Pull request health for `{}`\n", self.repository);
        let _ = writeln!(
            out,
            "{} open pull requests, {} healthy. Generated {}.",
            self.total,
            self.healthy,
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        for finding in Finding::ALL {
            let entries = self.category(finding);
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n### {} ({})\n", finding.title(), entries.len());
            let _ = writeln!(out, "| PR | Author | Age | Idle | Labels |");
            let _ = writeln!(out, "| --- | --- | --- | --- | --- |");
            for entry in entries {
                let _ = writeln!(
                    out,
                    "| [#{}]({}) {} | @{} | {}d | {}d | {} |",
                    entry.number,
                    entry.url,
                    entry.title.replace('|', "\\|"),
                    entry.author,
                    entry.age_days,
                    entry.idle_days,
                    entry.labels.join(", ")
                );
            }
        }
        if !self.auto_assigned.is_empty() {
            let _ = writeln!(out, "\n### Auto-assigned\n");
            for assignment in &self.auto_assigned {
                let mentions: Vec<String> =
                    assignment.assignees.iter().map(|a| format!("@{a}")).collect();
                let _ = writeln!(
                    out,
                    "- [#{}]({}) → {}",
                    assignment.number,
                    assignment.url,
                    mentions.join(", ")
                );
            }
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn label_suffix(labels: &[String]) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!(" [{}]", labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;
    use crate::github::User;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn pr(number: u64, title: &str) -> PullRequest {
        PullRequest {
            number,
            title: title.to_owned(),
            user: User {
                login: "octocat".to_owned(),
            },
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
            draft: false,
            labels: vec![],
            assignees: vec![],
            created_at: now(),
            updated_at: now(),
        }
    }

    fn assessment(findings: &[Finding]) -> Assessment {
        Assessment {
            findings: findings.iter().copied().collect::<BTreeSet<_>>(),
            blocking_labels: if findings.contains(&Finding::Blocked) {
                vec!["wip".to_owned()]
            } else {
                vec![]
            },
            age_days: 12,
            idle_days: 9,
        }
    }

    fn sample() -> Report {
        let mut report = Report::new("acme/widgets", now());
        report.record(&pr(1, "Fine"), &assessment(&[]));
        report.record(&pr(2, "Slow"), &assessment(&[Finding::Stale, Finding::Blocked]));
        report.record(&pr(3, "Lonely"), &assessment(&[Finding::Unassigned]));
        report
    }

    #[test]
    fn test_record_files_entries_by_category() {
        let report = sample();
        assert_eq!(report.total, 3);
        assert_eq!(report.healthy, 1);
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.blocked[0].labels, vec!["wip"]);
        assert_eq!(report.unassigned[0].number, 3);
        assert!(report.old.is_empty());
        assert!(report.has_findings());
        assert!(!Report::new("a/b", now()).has_findings());
    }

    #[test]
    fn test_summary_lists_non_empty_categories() {
        assert_eq!(
            sample().summary(),
            "PR health for acme/widgets: 3 open, 1 healthy\nStale: 1\nBlocked: 1\nUnassigned: 1"
        );
    }

    #[test]
    fn test_markdown_contains_tables() {
        let mut report = sample();
        report.record_assignment(&pr(3, "Lonely"), vec!["alice".to_owned()]);
        let md = report.to_markdown();
        assert!(md.contains("### Stale (1)"));
        assert!(md.contains("| [#2](https://github.com/acme/widgets/pull/2) Slow | @octocat | 12d | 9d | wip |"));
        assert!(md.contains("- [#3](https://github.com/acme/widgets/pull/3) → @alice"));
        assert!(!md.contains("### Old"));
    }

    #[test]
    fn test_text_includes_warnings() {
        let mut report = sample();
        report.warn("could not assign #3");
        let text = report.to_text();
        assert!(text.contains("Unassigned (1)"));
        assert!(text.contains("Warnings\n  could not assign #3"));
    }

    #[test]
    fn test_json_uses_snake_case_fields() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["awaiting_review"].as_array().unwrap().len(), 0);
        assert_eq!(json["blocked"][0]["labels"][0], "wip");
        assert!(json["stale"][0].get("labels").is_some());
        assert!(json["unassigned"][0].get("labels").is_none());
    }

    #[test]
    fn test_truncate_long_titles() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijk", 5), "abcd…");
    }
}
