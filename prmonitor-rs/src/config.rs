use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::TimeDelta;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = ".github/prmonitor.toml";

static REPOSITORY_SLUG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A([A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)/([A-Za-z0-9._-]+)\z")
        .expect("valid repository slug regex")
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid repository {0:?}, expected owner/name")]
    InvalidRepository(String),
    #[error("no repository configured")]
    MissingRepository,
    #[error("invalid threshold: {0}")]
    InvalidThreshold(&'static str),
}

/// A GitHub repository, written as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl FromStr for Repository {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = REPOSITORY_SLUG
            .captures(s.trim())
            .ok_or_else(|| ConfigError::InvalidRepository(s.to_owned()))?;
        Ok(Repository {
            owner: caps[1].to_owned(),
            name: caps[2].to_owned(),
        })
    }
}

impl TryFrom<String> for Repository {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Repository> for String {
    fn from(repo: Repository) -> Self {
        repo.to_string()
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_codeowners_paths")]
    pub codeowners_paths: Vec<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub actions: Actions,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            repository: None,
            api_url: default_api_url(),
            token_env: default_token_env(),
            codeowners_paths: default_codeowners_paths(),
            thresholds: Thresholds::default(),
            actions: Actions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Days without any update before a pull request counts as stale.
    pub stale_days: i64,
    /// Days since creation before a pull request counts as old.
    pub old_days: i64,
    /// Hours a pull request may wait for its first review.
    pub review_wait_hours: i64,
    /// Labels that block merging. Compared case-insensitively.
    pub blocking_labels: Vec<String>,
    pub exclude_drafts: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            stale_days: 7,
            old_days: 30,
            review_wait_hours: 48,
            blocking_labels: vec![
                "blocked".to_owned(),
                "do-not-merge".to_owned(),
                "wip".to_owned(),
            ],
            exclude_drafts: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actions {
    pub auto_assign: bool,
    pub comment_on_stale: bool,
    pub create_issue: bool,
    pub issue_title: String,
    pub issue_labels: Vec<String>,
    pub notify: bool,
    pub webhook_url_env: String,
}

impl Default for Actions {
    fn default() -> Self {
        Self {
            auto_assign: false,
            comment_on_stale: false,
            create_issue: false,
            issue_title: "Pull request health report".to_owned(),
            issue_labels: vec!["pr-health".to_owned()],
            notify: false,
            webhook_url_env: "PRMONITOR_WEBHOOK_URL".to_owned(),
        }
    }
}

impl Actions {
    /// Turn off every action that writes to GitHub or posts a notification.
    pub fn disable_writes(&mut self) {
        self.auto_assign = false;
        self.comment_on_stale = false;
        self.create_issue = false;
        self.notify = false;
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.is_none() {
            return Err(ConfigError::MissingRepository);
        }
        let thresholds = &self.thresholds;
        if thresholds.stale_days <= 0 {
            return Err(ConfigError::InvalidThreshold("stale_days must be positive"));
        }
        if TimeDelta::try_days(thresholds.stale_days).is_none() {
            return Err(ConfigError::InvalidThreshold("stale_days is too large"));
        }
        if thresholds.old_days <= 0 {
            return Err(ConfigError::InvalidThreshold("old_days must be positive"));
        }
        if TimeDelta::try_days(thresholds.old_days).is_none() {
            return Err(ConfigError::InvalidThreshold("old_days is too large"));
        }
        if thresholds.review_wait_hours < 0 {
            return Err(ConfigError::InvalidThreshold(
                "review_wait_hours must not be negative",
            ));
        }
        if TimeDelta::try_hours(thresholds.review_wait_hours).is_none() {
            return Err(ConfigError::InvalidThreshold("review_wait_hours is too large"));
        }
        Ok(())
    }
}

pub fn default_config_path(repo_root: impl AsRef<Path>) -> PathBuf {
    repo_root.as_ref().join(DEFAULT_CONFIG_PATH)
}

/// Load the config at `path`. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<MonitorConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(MonitorConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn default_api_url() -> String {
    "https://api.github.com".to_owned()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_owned()
}

fn default_codeowners_paths() -> Vec<String> {
    vec![
        ".github/CODEOWNERS".to_owned(),
        "CODEOWNERS".to_owned(),
        "docs/CODEOWNERS".to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(default_config_path(dir.path())).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.thresholds.stale_days, 7);
        assert!(!config.actions.auto_assign);
    }

    #[test]
    fn test_load_config_parses_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prmonitor.toml");
        fs::write(
            &path,
            r#"
repository = "acme/widgets"
token_env = "ACME_TOKEN"

[thresholds]
stale_days = 3
blocking_labels = ["On Hold"]

[actions]
auto_assign = true
notify = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.repository,
            Some(Repository {
                owner: "acme".to_owned(),
                name: "widgets".to_owned()
            })
        );
        assert_eq!(config.token_env, "ACME_TOKEN");
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.thresholds.stale_days, 3);
        assert_eq!(config.thresholds.old_days, 30);
        assert_eq!(config.thresholds.blocking_labels, vec!["On Hold"]);
        assert!(config.actions.auto_assign);
        assert!(config.actions.notify);
        assert!(!config.actions.create_issue);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_rejects_bad_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prmonitor.toml");
        fs::write(&path, "repository = \"not-a-slug\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_repository_parsing() {
        let repo: Repository = "acme/widgets-api".parse().unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets-api");
        assert_eq!(repo.to_string(), "acme/widgets-api");

        for bad in ["", "owner", "owner/", "/name", "a/b/c", "-x/y"] {
            assert!(bad.parse::<Repository>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_validate_checks_thresholds() {
        let mut config = MonitorConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRepository)));

        config.repository = Some("a/b".parse().unwrap());
        config.thresholds.stale_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_validate_rejects_unrepresentable_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prmonitor.toml");
        fs::write(
            &path,
            "repository = \"acme/widgets\"\n\n[thresholds]\nstale_days = 1000000000000000\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));

        let mut config = MonitorConfig {
            repository: Some("acme/widgets".parse().unwrap()),
            ..MonitorConfig::default()
        };
        config.thresholds.old_days = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));

        config.thresholds.old_days = 30;
        config.thresholds.review_wait_hours = i64::MAX / 2;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));

        config.thresholds.review_wait_hours = 48;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disable_writes_turns_off_actions() {
        let mut actions = Actions {
            auto_assign: true,
            comment_on_stale: true,
            create_issue: true,
            notify: true,
            ..Actions::default()
        };
        actions.disable_writes();
        assert_eq!(actions, Actions::default());
    }
}
