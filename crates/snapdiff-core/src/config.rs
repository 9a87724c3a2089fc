//! Report configuration document (`.snapdiff.json`)

use crate::rules::{RuleSet, RuleSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name looked up in the workspace root
pub const CONFIG_FILE_NAME: &str = ".snapdiff.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// PagerDuty integration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagerDutyConfig {
    #[serde(default)]
    pub subdomain: Option<String>,
}

/// Rollbar integration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbarConfig {
    pub account: String,
    pub project: String,
    #[serde(default = "default_rollbar_environment")]
    pub environment: String,
}

fn default_rollbar_environment() -> String {
    "production".to_string()
}

/// Integrations enabled for the whole report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Integrations {
    #[serde(default)]
    pub pagerduty: Option<PagerDutyConfig>,
    #[serde(default)]
    pub rollbar: Option<RollbarConfig>,
}

/// PagerDuty service backing a traced service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagerDutyService {
    pub service: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceIntegrations {
    #[serde(default)]
    pub pagerduty: Option<PagerDutyService>,
}

/// Per-service settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub violations: Vec<RuleSpec>,
    #[serde(default)]
    pub integrations: ServiceIntegrations,
}

/// Report configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub integrations: Integrations,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl ReportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the config document at `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `.snapdiff.json` from a workspace directory
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    /// Violation rules keyed by service
    pub fn rule_set(&self) -> RuleSet {
        RuleSet {
            services: self
                .services
                .iter()
                .map(|(name, svc)| (name.clone(), svc.violations.clone()))
                .collect(),
        }
    }

    /// PagerDuty service id configured for a traced service
    pub fn pagerduty_service(&self, service: &str) -> Option<&str> {
        self.services
            .get(service)?
            .integrations
            .pagerduty
            .as_ref()
            .map(|pd| pd.service.as_str())
    }
}
