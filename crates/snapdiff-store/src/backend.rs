//! Tracing backend transport

use crate::error::StoreError;
use crate::payload::{parse_created_id, parse_snapshot_list};
use async_trait::async_trait;
use snapdiff_core::Snapshot;

pub const DEFAULT_API_BASE: &str = "https://api.lightstep.com/public/v0.2";

/// Snapshot operations offered by the tracing backend.
///
/// Fetches return the raw response body so the store can cache it verbatim.
#[async_trait]
pub trait TraceBackend: Send + Sync {
    async fn create_snapshot(&self, project: &str, query: &str) -> Result<String, StoreError>;
    /// Snapshots for a project, oldest first
    async fn list_snapshots(&self, project: &str) -> Result<Vec<Snapshot>, StoreError>;
    async fn fetch_snapshot(&self, project: &str, snapshot_id: &str) -> Result<Vec<u8>, StoreError>;
    async fn fetch_diagram(&self, project: &str, snapshot_id: &str) -> Result<Vec<u8>, StoreError>;
}

/// Lightstep public API client
#[derive(Debug, Clone)]
pub struct LightstepClient {
    http: reqwest::Client,
    base_url: String,
    organization: String,
    api_key: String,
}

impl LightstepClient {
    pub fn new(organization: &str, api_key: &str) -> Self {
        Self::with_base_url(DEFAULT_API_BASE, organization, api_key)
    }

    pub fn with_base_url(base_url: &str, organization: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            organization: organization.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn snapshots_url(&self, project: &str) -> String {
        format!(
            "{}/{}/projects/{}/snapshots",
            self.base_url, self.organization, project
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, StoreError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let url = response.url().to_string();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                url,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl TraceBackend for LightstepClient {
    async fn create_snapshot(&self, project: &str, query: &str) -> Result<String, StoreError> {
        let request = self
            .http
            .post(self.snapshots_url(project))
            .json(&serde_json::json!({
                "data": {"attributes": {"query": query}}
            }));
        let body = self.send(request).await?;
        parse_created_id(&body, project)
    }

    async fn list_snapshots(&self, project: &str) -> Result<Vec<Snapshot>, StoreError> {
        let body = self.send(self.http.get(self.snapshots_url(project))).await?;
        parse_snapshot_list(&body, project)
    }

    async fn fetch_snapshot(&self, project: &str, snapshot_id: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!(
            "{}/{}?include-exemplars=1",
            self.snapshots_url(project),
            snapshot_id
        );
        self.send(self.http.get(url)).await
    }

    async fn fetch_diagram(&self, project: &str, snapshot_id: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!(
            "{}/{}/service-diagram",
            self.snapshots_url(project),
            snapshot_id
        );
        self.send(self.http.get(url)).await
    }
}
