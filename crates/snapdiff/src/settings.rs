//! Resolution of credentials and config before any network call

use crate::cli::BackendArgs;
use anyhow::{bail, Context};
use snapdiff_core::ReportConfig;
use snapdiff_store::{default_cache_dir, FsCache, LightstepClient, SnapshotStore};
use std::path::PathBuf;

pub type Store = SnapshotStore<LightstepClient, FsCache>;

/// Everything needed to talk to the tracing backend
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub organization: String,
    pub project: String,
    pub config: ReportConfig,
    pub cache_dir: PathBuf,
    pub disable_cache: bool,
}

impl Settings {
    pub fn resolve(args: &BackendArgs) -> anyhow::Result<Self> {
        let workspace = match &args.workspace {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("failed to read current directory")?,
        };
        let config = ReportConfig::load_from_dir(&workspace)?;
        Self::from_parts(args, config)
    }

    fn from_parts(args: &BackendArgs, config: ReportConfig) -> anyhow::Result<Self> {
        let api_key = required(args.api_key.clone(), "lightstep_api_key")?;
        let organization = required(
            args.organization.clone().or_else(|| config.organization.clone()),
            "lightstep_organization",
        )?;
        let project = required(
            args.project.clone().or_else(|| config.project.clone()),
            "lightstep_project",
        )?;

        Ok(Self {
            api_key,
            organization,
            project,
            config,
            cache_dir: args.cache_dir.clone().unwrap_or_else(default_cache_dir),
            disable_cache: args.disable_cache,
        })
    }

    pub fn client(&self) -> LightstepClient {
        LightstepClient::new(&self.organization, &self.api_key)
    }

    pub fn store(&self) -> Store {
        let store = SnapshotStore::new(self.client(), FsCache::new(&self.cache_dir));
        if self.disable_cache {
            store.without_write_through()
        } else {
            store
        }
    }
}

fn required(value: Option<String>, name: &str) -> anyhow::Result<String> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => Ok(v),
        None => bail!(
            "Input {} must be set as an env var, passed as an action input or set in the config file",
            name
        ),
    }
}
