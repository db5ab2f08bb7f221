use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::ACCEPT,
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Repository;

const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub user: User,
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    pub fn author(&self) -> &str {
        &self.user.login
    }

    pub fn is_assigned(&self) -> bool {
        !self.assignees.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub user: Option<User>,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user: Option<User>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ChangedFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    html_url: String,
}

#[derive(Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
}

#[derive(Serialize)]
struct NewAssignees<'a> {
    assignees: &'a [String],
}

/// The repository-hosting operations a monitoring pass relies on. The monitor
/// takes this as a parameter so tests can supply an in-memory implementation.
pub trait PullRequestGateway {
    fn open_pull_requests(&self) -> Result<Vec<PullRequest>, GatewayError>;

    fn reviews(&self, number: u64) -> Result<Vec<Review>, GatewayError>;

    /// Paths of every file changed by the pull request.
    fn changed_files(&self, number: u64) -> Result<Vec<String>, GatewayError>;

    /// Contents of a file on the default branch, or `None` if it doesn't exist.
    fn file_contents(&self, path: &str) -> Result<Option<String>, GatewayError>;

    fn comments(&self, number: u64) -> Result<Vec<Comment>, GatewayError>;

    fn create_comment(&self, number: u64, body: &str) -> Result<(), GatewayError>;

    /// Open an issue and return its URL.
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<String, GatewayError>;

    fn add_assignees(&self, number: u64, logins: &[String]) -> Result<(), GatewayError>;
}

/// [`PullRequestGateway`] backed by the GitHub REST API.
pub struct GithubClient {
    http: Client,
    api_url: String,
    repository: Repository,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(
        api_url: &str,
        repository: Repository,
        token: Option<String>,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("prmonitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_owned(),
            repository,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.repository.owner, self.repository.name, path
        )
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(self.http.get(self.url(path)).header(ACCEPT, JSON_MEDIA_TYPE))
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestBuilder {
        self.request(
            self.http
                .post(self.url(path))
                .header(ACCEPT, JSON_MEDIA_TYPE)
                .json(body),
        )
    }

    // Fetch every page of a list endpoint. GitHub signals the last page by
    // returning fewer than `per_page` items.
    fn get_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GatewayError> {
        let mut items = Vec::new();
        for page in 1.. {
            let response = self
                .get(path)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()?;
            let batch: Vec<T> = check_status(response)?.json()?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        debug!(path, count = items.len(), "fetched paginated list");
        Ok(items)
    }
}

fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

impl PullRequestGateway for GithubClient {
    fn open_pull_requests(&self) -> Result<Vec<PullRequest>, GatewayError> {
        self.get_paginated("pulls?state=open")
    }

    fn reviews(&self, number: u64) -> Result<Vec<Review>, GatewayError> {
        self.get_paginated(&format!("pulls/{number}/reviews"))
    }

    fn changed_files(&self, number: u64) -> Result<Vec<String>, GatewayError> {
        let files: Vec<ChangedFile> = self.get_paginated(&format!("pulls/{number}/files"))?;
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    fn file_contents(&self, path: &str) -> Result<Option<String>, GatewayError> {
        let response = self
            .request(
                self.http
                    .get(self.url(&format!("contents/{}", path.trim_start_matches('/'))))
                    .header(ACCEPT, RAW_MEDIA_TYPE),
            )
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response)?.text()?))
    }

    fn comments(&self, number: u64) -> Result<Vec<Comment>, GatewayError> {
        self.get_paginated(&format!("issues/{number}/comments"))
    }

    fn create_comment(&self, number: u64, body: &str) -> Result<(), GatewayError> {
        let response = self
            .post(&format!("issues/{number}/comments"), &NewComment { body })
            .send()?;
        check_status(response)?;
        Ok(())
    }

    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<String, GatewayError> {
        let response = self
            .post("issues", &NewIssue { title, body, labels })
            .send()?;
        let issue: CreatedIssue = check_status(response)?.json()?;
        Ok(issue.html_url)
    }

    fn add_assignees(&self, number: u64, logins: &[String]) -> Result<(), GatewayError> {
        let response = self
            .post(
                &format!("issues/{number}/assignees"),
                &NewAssignees { assignees: logins },
            )
            .send()?;
        check_status(response)?;
        Ok(())
    }
}
