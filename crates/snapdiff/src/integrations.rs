//! Third-party lookups shown alongside the report (on-call, deploys)

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const PAGERDUTY_API: &str = "https://api.pagerduty.com";
const ROLLBAR_API: &str = "https://api.rollbar.com/api/1";

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { status: u16, url: String },
    #[error("{0}")]
    NotFound(String),
    #[error("invalid url: {0}")]
    Url(String),
}

/// People on call for a service
#[derive(Debug, Clone, PartialEq)]
pub struct OnCall {
    pub service_url: String,
    pub users: Vec<String>,
}

/// On-call section of one report row; a failed lookup degrades to `Error`
#[derive(Debug, Clone, PartialEq)]
pub enum OnCallSection {
    Found(OnCall),
    Error(String),
}

/// The last deploy of an environment
#[derive(Debug, Clone, PartialEq)]
pub struct DeployStats {
    pub version: String,
    /// `None` when Rollbar has no item stats for the version
    pub new_items: Option<NewItems>,
}

/// Items first seen in a deployed version
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewItems {
    pub errors: u64,
    pub critical: u64,
}

#[async_trait]
pub trait OnCallLookup: Send + Sync {
    async fn on_call(&self, service_id: &str) -> Result<OnCall, IntegrationError>;
}

#[async_trait]
pub trait DeployLookup: Send + Sync {
    async fn last_deploy(&self, environment: &str) -> Result<DeployStats, IntegrationError>;
}

/// Lookups available for this run
#[derive(Clone, Default)]
pub struct Lookups {
    pub on_call: Option<Arc<dyn OnCallLookup>>,
    pub deploys: Option<Arc<dyn DeployLookup>>,
}

impl Lookups {
    pub fn from_tokens(pagerduty: Option<&str>, rollbar: Option<&str>) -> Self {
        Self {
            on_call: pagerduty
                .map(|t| Arc::new(PagerDutyClient::new(t)) as Arc<dyn OnCallLookup>),
            deploys: rollbar.map(|t| Arc::new(RollbarClient::new(t)) as Arc<dyn DeployLookup>),
        }
    }
}

/// Look up on-call info for `(service, pagerduty_service_id)` pairs concurrently
pub async fn lookup_on_call(
    lookup: Arc<dyn OnCallLookup>,
    services: Vec<(String, String)>,
) -> BTreeMap<String, OnCallSection> {
    let mut tasks = tokio::task::JoinSet::new();
    for (service, pd_service) in services {
        let lookup = Arc::clone(&lookup);
        tasks.spawn(async move {
            let section = match lookup.on_call(&pd_service).await {
                Ok(on_call) => OnCallSection::Found(on_call),
                Err(e) => {
                    tracing::warn!(service, error = %e, "on-call lookup failed");
                    OnCallSection::Error(e.to_string())
                }
            };
            (service, section)
        });
    }

    let mut sections = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((service, section)) => {
                sections.insert(service, section);
            }
            Err(e) => tracing::warn!(error = %e, "on-call lookup task failed"),
        }
    }
    sections
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
) -> Result<T, IntegrationError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(IntegrationError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response.json().await?)
}

pub struct PagerDutyClient {
    http: reqwest::Client,
    token: String,
}

impl PagerDutyClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
        }
    }

    fn get(&self, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("authorization", format!("Token token={}", self.token))
            .header("accept", "application/vnd.pagerduty+json;version=2")
    }
}

#[derive(Deserialize)]
struct PdServiceResponse {
    service: PdService,
}

#[derive(Deserialize)]
struct PdService {
    html_url: String,
    escalation_policy: PdReference,
}

#[derive(Deserialize)]
struct PdReference {
    id: String,
}

#[derive(Deserialize)]
struct PdOnCallsResponse {
    oncalls: Vec<PdOnCall>,
}

#[derive(Deserialize)]
struct PdOnCall {
    user: PdUser,
}

#[derive(Deserialize)]
struct PdUser {
    summary: String,
}

#[async_trait]
impl OnCallLookup for PagerDutyClient {
    async fn on_call(&self, service_id: &str) -> Result<OnCall, IntegrationError> {
        let service: PdServiceResponse =
            get_json(self.get(format!("{}/services/{}", PAGERDUTY_API, service_id))).await?;
        let oncalls: PdOnCallsResponse = get_json(self.get(format!(
            "{}/oncalls?escalation_policy_ids%5B%5D={}",
            PAGERDUTY_API, service.service.escalation_policy.id
        )))
        .await?;

        let mut users: Vec<String> = Vec::new();
        for oncall in oncalls.oncalls {
            if !users.contains(&oncall.user.summary) {
                users.push(oncall.user.summary);
            }
        }
        Ok(OnCall {
            service_url: service.service.html_url,
            users,
        })
    }
}

pub struct RollbarClient {
    http: reqwest::Client,
    token: String,
}

impl RollbarClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
        }
    }

    fn get(&self, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("x-rollbar-access-token", &self.token)
    }
}

#[derive(Deserialize)]
struct RollbarResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct RollbarDeploys {
    deploys: Vec<RollbarDeploy>,
}

#[derive(Deserialize)]
struct RollbarDeploy {
    environment: String,
    revision: String,
}

#[derive(Deserialize)]
struct RollbarVersion {
    item_stats: Option<RollbarItemStats>,
}

#[derive(Deserialize)]
struct RollbarItemStats {
    new: Option<RollbarCounts>,
}

#[derive(Deserialize, Default)]
struct RollbarCounts {
    #[serde(default)]
    error: u64,
    #[serde(default)]
    critical: u64,
}

impl RollbarVersion {
    fn new_items(&self) -> Option<NewItems> {
        let counts = self.item_stats.as_ref()?.new.as_ref()?;
        Some(NewItems {
            errors: counts.error,
            critical: counts.critical,
        })
    }
}

fn version_url(revision: &str, environment: &str) -> Result<reqwest::Url, IntegrationError> {
    let mut url =
        reqwest::Url::parse(ROLLBAR_API).map_err(|e| IntegrationError::Url(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| IntegrationError::Url(ROLLBAR_API.to_string()))?
        .push("version")
        .push(revision);
    url.query_pairs_mut().append_pair("environment", environment);
    Ok(url)
}

#[async_trait]
impl DeployLookup for RollbarClient {
    async fn last_deploy(&self, environment: &str) -> Result<DeployStats, IntegrationError> {
        let deploys: RollbarResponse<RollbarDeploys> =
            get_json(self.get(format!("{}/deploys", ROLLBAR_API))).await?;
        let deploy = deploys
            .result
            .deploys
            .into_iter()
            .find(|d| d.environment == environment)
            .ok_or_else(|| {
                IntegrationError::NotFound(format!("no deploy found for {}", environment))
            })?;

        let version: RollbarResponse<RollbarVersion> =
            get_json(self.get(version_url(&deploy.revision, environment)?)).await?;

        Ok(DeployStats {
            new_items: version.result.new_items(),
            version: deploy.revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeOnCall;

    #[async_trait]
    impl OnCallLookup for FakeOnCall {
        async fn on_call(&self, service_id: &str) -> Result<OnCall, IntegrationError> {
            if service_id == "broken" {
                return Err(IntegrationError::NotFound("unknown service".to_string()));
            }
            Ok(OnCall {
                service_url: format!("https://pd.test/{}", service_id),
                users: vec!["Ada".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn test_lookup_on_call_degrades_per_service() {
        let sections = lookup_on_call(
            Arc::new(FakeOnCall),
            vec![
                ("api".to_string(), "P1".to_string()),
                ("web".to_string(), "broken".to_string()),
            ],
        )
        .await;

        assert_eq!(sections.len(), 2);
        assert!(matches!(&sections["api"], OnCallSection::Found(o) if o.users == ["Ada"]));
        assert!(matches!(&sections["web"], OnCallSection::Error(e) if e.contains("unknown")));
    }

    #[test]
    fn test_rollbar_version_parse() {
        let body = r#"{"result": {"item_stats": {"new": {"error": 3, "critical": 1, "warning": 7}}}}"#;
        let parsed: RollbarResponse<RollbarVersion> = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.result.new_items(),
            Some(NewItems {
                errors: 3,
                critical: 1
            })
        );
    }

    #[test]
    fn test_rollbar_version_without_item_stats() {
        for body in [
            r#"{"result": {}}"#,
            r#"{"result": {"item_stats": null}}"#,
            r#"{"result": {"item_stats": {"repeated": {"error": 2}}}}"#,
        ] {
            let parsed: RollbarResponse<RollbarVersion> = serde_json::from_str(body).unwrap();
            assert_eq!(parsed.result.new_items(), None, "{}", body);
        }
    }

    #[test]
    fn test_rollbar_version_url_encodes() {
        let url = version_url("abc 1", "staging&debug=1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.rollbar.com/api/1/version/abc%201?environment=staging%26debug%3D1"
        );
        assert_eq!(
            version_url("v2", "production").unwrap().as_str(),
            "https://api.rollbar.com/api/1/version/v2?environment=production"
        );
    }

    #[test]
    fn test_lookups_from_tokens() {
        let lookups = Lookups::from_tokens(Some("pd"), None);
        assert!(lookups.on_call.is_some());
        assert!(lookups.deploys.is_none());
    }
}
