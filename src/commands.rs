//! CLI Command Handlers
//!
//! Each handler takes CLI args, the loaded config and Output, returns
//! ExitCode. Upstream failure details go to the log; the user sees a generic
//! message.

use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::api::ZileanProvider;
use crate::cli::{
    validate_imdb_id, BestCmd, ContentArgs, ExitCode, HealthStatus, Output, SearchCmd,
    StreamOutput, StreamsCmd,
};
use crate::config::Config;
use crate::error::{ErrorKind, ProviderError};
use crate::models::{NormalizedStream, Quality};

const NOT_AVAILABLE: &str = "stream not available";

fn zilean(config: &Config) -> ZileanProvider {
    match &config.zilean_url {
        Some(url) => ZileanProvider::with_base_url(url.clone()),
        None => ZileanProvider::new(),
    }
}

fn check_content(content: &ContentArgs, output: &Output) -> Result<(), ExitCode> {
    validate_imdb_id(&content.imdb_id)
        .map(|_| ())
        .map_err(|msg| output.error(msg, ExitCode::InvalidArgs))
}

/// Log the upstream error and report the generic message
fn lookup_failed(err: &ProviderError, output: &Output) -> ExitCode {
    warn!(error = %err, "stream lookup failed");
    let code = match err.kind() {
        ErrorKind::Fetch => ExitCode::NetworkError,
        ErrorKind::NoStreams | ErrorKind::NoResults | ErrorKind::NoStreamFound => {
            ExitCode::NoStreams
        }
        _ => ExitCode::Error,
    };
    output.error(NOT_AVAILABLE, code)
}

fn print<T: serde::Serialize>(data: T, output: &Output) -> ExitCode {
    match output.print(data) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Streams Command
// =============================================================================

pub async fn streams_cmd(cmd: StreamsCmd, config: &Config, output: &Output) -> ExitCode {
    if let Err(code) = check_content(&cmd.content, output) {
        return code;
    }

    let aggregator = Aggregator::from_config(config);
    let ContentArgs {
        imdb_id,
        season,
        episode,
    } = &cmd.content;
    output.info(format!("Fetching streams for: {}", imdb_id));

    let mut streams = match aggregator.streams(imdb_id, *season, *episode).await {
        Ok(streams) => streams,
        Err(e) => return lookup_failed(&e, output),
    };

    if let Some(filter) = cmd.quality {
        streams.retain(|s| s.quality == filter.quality());
    }
    if cmd.cached {
        streams.retain(|s| s.cached);
    }
    streams.truncate(cmd.limit);

    if streams.is_empty() {
        return output.error(NOT_AVAILABLE, ExitCode::NoStreams);
    }

    if !output.json {
        for stream in &streams {
            println!("{}", stream);
        }
        return ExitCode::Success;
    }

    let rows: Vec<StreamOutput> = streams.iter().map(StreamOutput::from).collect();
    print(rows, output)
}

// =============================================================================
// Best Command
// =============================================================================

pub async fn best_cmd(cmd: BestCmd, config: &Config, output: &Output) -> ExitCode {
    if let Err(code) = check_content(&cmd.content, output) {
        return code;
    }

    let aggregator = Aggregator::from_config(config);
    let max_quality = cmd.quality.map_or(config.max_quality, |q| q.value());
    let content = &cmd.content;
    output.info(format!(
        "Picking best stream up to {}",
        Quality::from_value(max_quality)
    ));

    match aggregator
        .best_stream(&content.imdb_id, content.season, content.episode, max_quality)
        .await
    {
        Ok(stream) => {
            debug!(source = %stream.source, quality = %stream.quality, "best stream picked");
            print(best_output(&aggregator, &stream), output)
        }
        Err(e) => lookup_failed(&e, output),
    }
}

/// Stream row with the direct play URL when the aggregator can resolve one
fn best_output(aggregator: &Aggregator, stream: &NormalizedStream) -> StreamOutput {
    let mut row = StreamOutput::from(stream);
    match aggregator.resolve_play_url(stream) {
        Ok(url) => row.play_url = Some(url),
        Err(e) => debug!(error = %e, "no direct play url"),
    }
    row
}

// =============================================================================
// Search Command
// =============================================================================

pub async fn search_cmd(cmd: SearchCmd, config: &Config, output: &Output) -> ExitCode {
    output.info(format!("Searching for: {}", cmd.query));

    match zilean(config).search(&cmd.query).await {
        Ok(mut streams) => {
            streams.truncate(cmd.limit);
            let rows: Vec<StreamOutput> = streams.iter().map(StreamOutput::from).collect();
            print(rows, output)
        }
        Err(e) => {
            warn!(error = %e, "hash search failed");
            output.error("Search failed", ExitCode::NetworkError)
        }
    }
}

// =============================================================================
// Providers / Health Commands
// =============================================================================

pub fn providers_cmd(config: &Config, output: &Output) -> ExitCode {
    let aggregator = Aggregator::from_config(config);
    print(aggregator.provider_names(), output)
}

pub async fn health_cmd(config: &Config, output: &Output) -> ExitCode {
    match zilean(config).ping().await {
        Ok(()) => print(
            HealthStatus {
                provider: "zilean".to_string(),
                status: "ok",
            },
            output,
        ),
        Err(e) => {
            warn!(error = %e, "health check failed");
            output.error("zilean unreachable", ExitCode::NetworkError)
        }
    }
}
