//! streamhub - multi-provider stream aggregator
//!
//! # Usage
//!
//! ```bash
//! streamhub streams tt1877830
//! streamhub best tt0903747 -s 1 -e 3 --json
//! RUST_LOG=streamhub=debug streamhub providers
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamhub::cli::{Cli, Command, ExitCode, Output};
use streamhub::commands;
use streamhub::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamhub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run_cli(cli).await.into()
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => return output.error(format!("{:#}", e), ExitCode::ConfigError),
        },
        None => Config::load(),
    };

    match cli.command {
        Command::Streams(cmd) => commands::streams_cmd(cmd, &config, &output).await,
        Command::Best(cmd) => commands::best_cmd(cmd, &config, &output).await,
        Command::Search(cmd) => commands::search_cmd(cmd, &config, &output).await,
        Command::Providers => commands::providers_cmd(&config, &output),
        Command::Health => commands::health_cmd(&config, &output).await,
    }
}
