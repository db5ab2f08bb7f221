use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::{
    config::Thresholds,
    github::{PullRequest, Review},
};

/// A reason a pull request needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    Stale,
    Old,
    Blocked,
    Unassigned,
    AwaitingReview,
}

impl Finding {
    pub const ALL: [Finding; 5] = [
        Finding::Stale,
        Finding::Old,
        Finding::Blocked,
        Finding::Unassigned,
        Finding::AwaitingReview,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Finding::Stale => "Stale",
            Finding::Old => "Old",
            Finding::Blocked => "Blocked",
            Finding::Unassigned => "Unassigned",
            Finding::AwaitingReview => "Awaiting first review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub findings: BTreeSet<Finding>,
    /// Labels on the pull request that are configured as blocking.
    pub blocking_labels: Vec<String>,
    pub age_days: i64,
    pub idle_days: i64,
}

impl Assessment {
    pub fn is_healthy(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn has(&self, finding: Finding) -> bool {
        self.findings.contains(&finding)
    }
}

/// Evaluate a pull request against the thresholds as of `now`.
pub fn assess(
    pr: &PullRequest,
    reviews: &[Review],
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Assessment {
    let age = now - pr.created_at;
    let idle = now - pr.updated_at;
    let mut findings = BTreeSet::new();

    if exceeds(idle, TimeDelta::try_days(thresholds.stale_days)) {
        findings.insert(Finding::Stale);
    }
    if exceeds(age, TimeDelta::try_days(thresholds.old_days)) {
        findings.insert(Finding::Old);
    }

    let blocking_labels = blocking_labels(pr, &thresholds.blocking_labels);
    if !blocking_labels.is_empty() {
        findings.insert(Finding::Blocked);
    }

    if !pr.is_assigned() {
        findings.insert(Finding::Unassigned);
    }

    let reviewed = reviews.iter().any(|review| {
        review
            .user
            .as_ref()
            .map_or(true, |user| user.login != pr.author())
    });
    if !reviewed && exceeds(age, TimeDelta::try_hours(thresholds.review_wait_hours)) {
        findings.insert(Finding::AwaitingReview);
    }

    Assessment {
        findings,
        blocking_labels,
        age_days: age.num_days(),
        idle_days: idle.num_days(),
    }
}

// A threshold too large to represent is never reached.
fn exceeds(elapsed: TimeDelta, threshold: Option<TimeDelta>) -> bool {
    threshold.is_some_and(|threshold| elapsed >= threshold)
}

fn blocking_labels(pr: &PullRequest, configured: &[String]) -> Vec<String> {
    pr.labels
        .iter()
        .filter(|label| {
            configured
                .iter()
                .any(|blocking| blocking.eq_ignore_ascii_case(&label.name))
        })
        .map(|label| label.name.clone())
        .collect()
}
