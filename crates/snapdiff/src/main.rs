mod cli;
mod commands;
mod github;
mod integrations;
mod outputs;
mod report;
mod settings;

use clap::Parser;
use cli::{Cli, Commands};
use outputs::ActionOutputs;
use settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for step outputs
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (backend, command) = Cli::parse().into_command();
    let settings = Settings::resolve(&backend)?;
    let outputs = ActionOutputs::from_env();

    match command {
        Commands::Create(args) => commands::create::run(&settings, &args, &outputs).await,
        Commands::Analyze(args) => commands::analyze::run(&settings, &args, &outputs).await,
        Commands::Run(args) => commands::run(&settings, args.query, &args.analyze, &outputs).await,
    }
}
