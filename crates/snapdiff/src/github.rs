//! Pull request comments through the GitHub REST API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("invalid repository {0:?}, expected owner/name")]
    Repository(String),
    #[error("failed to read event payload: {0}")]
    Event(String),
    #[error("{0} must be set to comment on the pull request")]
    MissingInput(&'static str),
}

/// Somewhere a rendered report can be posted
#[async_trait]
pub trait CommentTarget: Send + Sync {
    async fn comment(&self, body: &str) -> Result<(), GithubError>;
}

/// The pull request of the running workflow
#[derive(Debug, Clone, Default)]
pub struct WorkflowPullRequest {
    pub token: Option<String>,
    pub repository: Option<String>,
}

#[async_trait]
impl CommentTarget for WorkflowPullRequest {
    async fn comment(&self, body: &str) -> Result<(), GithubError> {
        let token = self
            .token
            .as_deref()
            .ok_or(GithubError::MissingInput("GITHUB_TOKEN"))?;
        let repository = self
            .repository
            .as_deref()
            .ok_or(GithubError::MissingInput("GITHUB_REPOSITORY"))?;
        let ctx = GithubContext::from_env(repository)?;
        GithubClient::new(token).comment(&ctx, body).await?;
        Ok(())
    }
}

/// Where the workflow is running
#[derive(Debug, Clone, PartialEq)]
pub struct GithubContext {
    pub owner: String,
    pub repo: String,
    pub sha: Option<String>,
    /// Issue or pull request number from the triggering event
    pub number: Option<u64>,
}

impl GithubContext {
    pub fn new(repository: &str, sha: Option<String>, number: Option<u64>) -> Result<Self, GithubError> {
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty())
            .ok_or_else(|| GithubError::Repository(repository.to_string()))?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            sha,
            number,
        })
    }

    /// Read `GITHUB_SHA` and the event payload at `GITHUB_EVENT_PATH`
    pub fn from_env(repository: &str) -> Result<Self, GithubError> {
        let sha = std::env::var("GITHUB_SHA").ok();
        let number = match std::env::var_os("GITHUB_EVENT_PATH") {
            Some(path) => event_number(Path::new(&path))?,
            None => None,
        };
        Self::new(repository, sha, number)
    }
}

fn event_number(path: &Path) -> Result<Option<u64>, GithubError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| GithubError::Event(e.to_string()))?;
    let event: Value =
        serde_json::from_str(&content).map_err(|e| GithubError::Event(e.to_string()))?;
    Ok(number_from_event(&event))
}

fn number_from_event(event: &Value) -> Option<u64> {
    event
        .pointer("/issue/number")
        .or_else(|| event.pointer("/pull_request/number"))
        .or_else(|| event.get("number"))
        .and_then(Value::as_u64)
}

#[derive(Deserialize)]
struct PullRequest {
    number: u64,
}

pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GITHUB_API.to_string(),
            token: token.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("user-agent", concat!("snapdiff/", env!("CARGO_PKG_VERSION")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, GithubError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(GithubError::Status {
            status: status.as_u16(),
            url,
            body,
        })
    }

    /// Pull request number for the event, falling back to the first PR containing the commit
    pub async fn pull_request_number(&self, ctx: &GithubContext) -> Result<Option<u64>, GithubError> {
        if ctx.number.is_some() {
            return Ok(ctx.number);
        }
        let Some(sha) = &ctx.sha else {
            return Ok(None);
        };

        let url = format!(
            "{}/repos/{}/{}/commits/{}/pulls",
            self.base_url, ctx.owner, ctx.repo, sha
        );
        let response = self.send(self.request(reqwest::Method::GET, &url)).await?;
        let pulls: Vec<PullRequest> = response.json().await?;
        Ok(pulls.first().map(|p| p.number))
    }

    /// Post `body` on the pull request; returns false when there is none to comment on
    pub async fn comment(&self, ctx: &GithubContext, body: &str) -> Result<bool, GithubError> {
        let Some(number) = self.pull_request_number(ctx).await? else {
            tracing::info!(repo = %ctx.repo, "no pull request found, skipping comment");
            return Ok(false);
        };

        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, ctx.owner, ctx.repo, number
        );
        self.send(
            self.request(reqwest::Method::POST, &url)
                .json(&serde_json::json!({ "body": body })),
        )
        .await?;
        tracing::info!(number, "posted report comment");
        Ok(true)
    }
}
