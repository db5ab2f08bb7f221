use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    changeset::ChangesetOwners,
    config::MonitorConfig,
    github::{Comment, GatewayError, PullRequest, PullRequestGateway},
    health::{self, Assessment, Finding},
    notify::Notifier,
    parser,
    report::Report,
    ruleset::RuleSet,
};

/// Wording the stale-comment check looks for in earlier comments.
const STALE_COMMENT_MARKER: &str = "This PR has been inactive";

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to list open pull requests: {0}")]
    ListPullRequests(#[source] GatewayError),
}

/// Runs monitoring passes over a repository's open pull requests.
pub struct Monitor<G> {
    gateway: G,
    config: MonitorConfig,
    notifier: Option<Box<dyn Notifier>>,
}

impl<G: PullRequestGateway> Monitor<G> {
    pub fn new(gateway: G, config: MonitorConfig) -> Self {
        Self {
            gateway,
            config,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Fetch and parse the first CODEOWNERS file found at the configured
    /// paths. Returns `None` when there is no such file.
    pub fn load_rules(&self) -> Option<RuleSet> {
        for path in &self.config.codeowners_paths {
            let source = match self.gateway.file_contents(path) {
                Ok(Some(source)) => source,
                Ok(None) => continue,
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to fetch CODEOWNERS");
                    continue;
                }
            };

            let result = parser::parse(&source);
            for skipped in &result.skipped {
                debug!(path = %path, line = skipped.line, reason = %skipped.reason, "skipped CODEOWNERS line");
            }
            info!(path = %path, rules = result.rules.len(), "loaded CODEOWNERS");
            return Some(result.into_ruleset());
        }
        None
    }

    /// Owners of every file changed by a pull request.
    pub fn pull_request_owners(
        &self,
        number: u64,
        rules: &RuleSet,
    ) -> Result<BTreeSet<String>, GatewayError> {
        let files = self.gateway.changed_files(number)?;
        let resolved = ChangesetOwners::resolve(rules, &files);
        debug!(
            pr = number,
            files = files.len(),
            owners = resolved.owners.len(),
            unowned = resolved.unowned.len(),
            "resolved changeset owners"
        );
        Ok(resolved.owners)
    }

    /// Run one pass: assess every open pull request, take the configured
    /// actions and return the report. Only failing to list pull requests
    /// aborts the pass; everything else becomes a warning in the report.
    pub fn run(&self, now: DateTime<Utc>) -> Result<Report, MonitorError> {
        let repository = self
            .config
            .repository
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default();
        let mut report = Report::new(repository, now);
        let thresholds = &self.config.thresholds;
        let actions = &self.config.actions;

        let pulls = self
            .gateway
            .open_pull_requests()
            .map_err(MonitorError::ListPullRequests)?;
        info!(count = pulls.len(), "fetched open pull requests");

        let rules = if actions.auto_assign {
            let rules = self.load_rules();
            if rules.is_none() {
                info!("no CODEOWNERS file found, auto-assignment disabled");
            }
            rules
        } else {
            None
        };

        for pr in &pulls {
            if pr.draft && thresholds.exclude_drafts {
                debug!(pr = pr.number, "skipping draft");
                continue;
            }

            let reviews = match self.gateway.reviews(pr.number) {
                Ok(reviews) => reviews,
                Err(err) => {
                    warn!(pr = pr.number, error = %err, "failed to fetch reviews");
                    report.warn(format!("#{}: could not fetch reviews: {}", pr.number, err));
                    Vec::new()
                }
            };
            let mut assessment = health::assess(pr, &reviews, thresholds, now);

            if assessment.has(Finding::Unassigned) {
                if let Some(rules) = &rules {
                    if let Some(assignees) = self.auto_assign(pr, rules, &mut report) {
                        assessment.findings.remove(&Finding::Unassigned);
                        report.record_assignment(pr, assignees);
                    }
                }
            }

            if assessment.has(Finding::Stale) && actions.comment_on_stale {
                self.comment_on_stale(pr, &assessment, now, &mut report);
            }

            report.record(pr, &assessment);
        }

        if actions.create_issue && report.has_findings() {
            match self.gateway.create_issue(
                &actions.issue_title,
                &report.to_markdown(),
                &actions.issue_labels,
            ) {
                Ok(url) => info!(url = %url, "created report issue"),
                Err(err) => {
                    warn!(error = %err, "failed to create report issue");
                    report.warn(format!("could not create report issue: {}", err));
                }
            }
        }

        if actions.notify {
            match &self.notifier {
                Some(notifier) => {
                    if let Err(err) = notifier.notify(&report.summary()) {
                        warn!(error = %err, "failed to send notification");
                        report.warn(format!("could not send notification: {}", err));
                    }
                }
                None => warn!("notifications enabled but no webhook configured"),
            }
        }

        Ok(report)
    }

    // Assign the changeset's owners to an unassigned pull request. Returns the
    // assignees on success. An empty owner set is not an error.
    fn auto_assign(
        &self,
        pr: &PullRequest,
        rules: &RuleSet,
        report: &mut Report,
    ) -> Option<Vec<String>> {
        let mut owners = match self.pull_request_owners(pr.number, rules) {
            Ok(owners) => owners,
            Err(err) => {
                warn!(pr = pr.number, error = %err, "failed to list changed files");
                report.warn(format!(
                    "#{}: could not list changed files: {}",
                    pr.number, err
                ));
                return None;
            }
        };
        owners.remove(pr.author());
        if owners.is_empty() {
            debug!(pr = pr.number, "no owners found for changeset");
            return None;
        }

        let assignees: Vec<String> = owners.into_iter().collect();
        match self.gateway.add_assignees(pr.number, &assignees) {
            Ok(()) => {
                info!(pr = pr.number, assignees = ?assignees, "assigned owners");
                Some(assignees)
            }
            Err(err) => {
                warn!(pr = pr.number, error = %err, "failed to assign owners");
                report.warn(format!(
                    "#{}: could not assign {}: {}",
                    pr.number,
                    assignees.join(", "),
                    err
                ));
                None
            }
        }
    }

    fn comment_on_stale(
        &self,
        pr: &PullRequest,
        assessment: &Assessment,
        now: DateTime<Utc>,
        report: &mut Report,
    ) {
        let comments = match self.gateway.comments(pr.number) {
            Ok(comments) => comments,
            Err(err) => {
                warn!(pr = pr.number, error = %err, "failed to fetch comments");
                report.warn(format!("#{}: could not fetch comments: {}", pr.number, err));
                return;
            }
        };

        let window = TimeDelta::try_days(self.config.thresholds.stale_days);
        if has_recent_stale_comment(&comments, now, window) {
            debug!(pr = pr.number, "stale comment already posted");
            return;
        }

        let body = stale_comment_body(pr, assessment.idle_days);
        if let Err(err) = self.gateway.create_comment(pr.number, &body) {
            warn!(pr = pr.number, error = %err, "failed to post stale comment");
            report.warn(format!("#{}: could not comment: {}", pr.number, err));
        }
    }
}

fn stale_comment_body(pr: &PullRequest, idle_days: i64) -> String {
    format!(
        "@{} this pull request has had no activity for {} days. \
         Please update it, or close it if it's no longer needed.",
        pr.author(),
        idle_days
    )
}

// Looks for the legacy wording, which `stale_comment_body` doesn't use, so
// comments posted by this monitor are never detected and a stale pull request
// gets a new comment on every pass.
// A window too large to represent covers every earlier comment.
fn has_recent_stale_comment(
    comments: &[Comment],
    now: DateTime<Utc>,
    window: Option<TimeDelta>,
) -> bool {
    comments.iter().any(|c| {
        let recent = window.map_or(true, |window| now - c.created_at <= window);
        recent && c.body.contains(STALE_COMMENT_MARKER)
    })
}
