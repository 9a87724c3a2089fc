use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapdiff")]
#[command(version)]
#[command(about = "Trace snapshot diff reports for CI")]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    // used when no subcommand is given
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The chosen command, falling back to `run`
    pub fn into_command(self) -> (BackendArgs, Commands) {
        let command = self.command.unwrap_or(Commands::Run(self.run));
        (self.backend, command)
    }
}

/// Credentials and cache settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Tracing backend API key
    #[arg(long, env = "LIGHTSTEP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Organization (falls back to the config document)
    #[arg(long, env = "LIGHTSTEP_ORGANIZATION")]
    pub organization: Option<String>,

    /// Project (falls back to the config document)
    #[arg(long, env = "LIGHTSTEP_PROJECT")]
    pub project: Option<String>,

    /// Directory holding the config document
    #[arg(long, env = "GITHUB_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Snapshot cache directory
    #[arg(long, env = "SNAPDIFF_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Do not write fetched snapshots to the cache
    #[arg(
        long,
        env = "DISABLE_CACHE_SNAPSHOTS",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub disable_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Take a new snapshot
    Create(CreateArgs),

    /// Report on a snapshot, optionally compared with another
    Analyze(AnalyzeArgs),

    /// Create when a query is given, analyze otherwise (the default)
    Run(RunArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Query for a new snapshot
    #[arg(long, env = "LIGHTSTEP_SNAPSHOT_QUERY")]
    pub query: Option<String>,

    #[command(flatten)]
    pub analyze: AnalyzeArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Query selecting the spans to capture
    #[arg(long, env = "LIGHTSTEP_SNAPSHOT_QUERY")]
    pub query: String,

    /// Repository to tag the snapshot with (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Snapshot to report on
    #[arg(long, env = "LIGHTSTEP_SNAPSHOT_ID")]
    pub snapshot_id: Option<String>,

    /// Baseline snapshot; `*` picks the most recent other snapshot
    #[arg(long, env = "LIGHTSTEP_SNAPSHOT_COMPARE_ID")]
    pub compare_id: Option<String>,

    /// Comma-separated services to show in the report
    #[arg(long, env = "LIGHTSTEP_SERVICE_FILTER")]
    pub service_filter: Option<String>,

    /// Skip posting the report as a pull request comment
    #[arg(
        long,
        env = "DISABLE_COMMENT",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub disable_comment: bool,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repository used for baseline selection and comments (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    #[arg(long, env = "PAGERDUTY_API_TOKEN", hide_env_values = true)]
    pub pagerduty_token: Option<String>,

    #[arg(long, env = "ROLLBAR_API_TOKEN", hide_env_values = true)]
    pub rollbar_token: Option<String>,
}
