//! CLI - Command Line Interface for streamhub
//!
//! Thin host over the aggregator. All output is JSON-parseable; logs go to
//! stderr.
//!
//! # Examples
//!
//! ```bash
//! # Every stream from the enabled providers
//! streamhub streams tt1877830
//!
//! # Best cached episode stream at or below 1080p
//! streamhub best tt0903747 -s 1 -e 3 -Q 1080p --json
//!
//! # Free-text hash database search
//! streamhub search "the batman 2022"
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::models::{NormalizedStream, Quality};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Configuration could not be loaded
    ConfigError = 4,
    /// No streams available
    NoStreams = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// streamhub - multi-provider stream aggregator
#[derive(Parser, Debug)]
#[command(
    name = "streamhub",
    version,
    author = "Gorka & Hermes",
    about = "Aggregate streams for a title across addons, hash databases and scrapers",
    after_help = "EXAMPLES:\n\
                  streamhub streams tt1877830            All streams for a movie\n\
                  streamhub best tt0903747 -s 1 -e 3     Best stream for an episode\n\
                  streamhub providers --json             Enabled providers"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every stream from the enabled providers
    #[command(visible_alias = "st")]
    Streams(StreamsCmd),

    /// Pick the single best cached stream
    #[command(visible_alias = "b")]
    Best(BestCmd),

    /// Free-text search of the hash database
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Show the enabled providers in query order
    #[command(visible_alias = "p")]
    Providers,

    /// Check the hash database is reachable
    Health,
}

// =============================================================================
// Streams Command
// =============================================================================

/// Content coordinates shared by `streams` and `best`
#[derive(Args, Debug, Clone)]
pub struct ContentArgs {
    /// IMDB ID (e.g., tt1877830)
    #[arg(required = true)]
    pub imdb_id: String,

    /// Season number (for TV shows)
    #[arg(long, short = 's', requires = "episode")]
    pub season: Option<u32>,

    /// Episode number (for TV shows)
    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u32>,
}

/// Get available streams for content
#[derive(Args, Debug)]
pub struct StreamsCmd {
    #[command(flatten)]
    pub content: ContentArgs,

    /// Keep only streams of exactly this quality
    #[arg(long, short = 'Q', value_enum)]
    pub quality: Option<QualityFilter>,

    /// Only streams reported as debrid-cached
    #[arg(long)]
    pub cached: bool,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "50")]
    pub limit: usize,
}

/// Pick the best stream for content
#[derive(Args, Debug)]
pub struct BestCmd {
    #[command(flatten)]
    pub content: ContentArgs,

    /// Quality cap (defaults to the configured cap)
    #[arg(long, short = 'Q', value_enum)]
    pub quality: Option<QualityFilter>,
}

/// Search the hash database by release name
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search query (title, release name)
    #[arg(required = true)]
    pub query: String,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Quality filter for streams
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFilter {
    /// 4K / 2160p
    #[value(name = "4k", alias = "2160p")]
    Q4k,
    /// 1080p Full HD
    #[value(name = "1080p")]
    Q1080p,
    /// 720p HD
    #[value(name = "720p")]
    Q720p,
    /// 480p SD
    #[value(name = "480p")]
    Q480p,
}

impl QualityFilter {
    pub fn quality(self) -> Quality {
        match self {
            QualityFilter::Q4k => Quality::UHD4K,
            QualityFilter::Q1080p => Quality::FHD1080p,
            QualityFilter::Q720p => Quality::HD720p,
            QualityFilter::Q480p => Quality::SD480p,
        }
    }

    /// Numeric cap for best-stream selection
    pub fn value(self) -> u32 {
        self.quality().value()
    }
}

impl std::fmt::Display for QualityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityFilter::Q4k => write!(f, "4K"),
            QualityFilter::Q1080p => write!(f, "1080p"),
            QualityFilter::Q720p => write!(f, "720p"),
            QualityFilter::Q480p => write!(f, "480p"),
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// One stream as printed by `streams` and `best`
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamOutput {
    pub provider: String,
    pub name: String,
    pub title: String,
    pub quality: Quality,
    pub size: String,
    pub seeders: u32,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet: Option<String>,
    /// Direct play URL, set by `best` when one resolves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_url: Option<String>,
}

impl From<&NormalizedStream> for StreamOutput {
    fn from(stream: &NormalizedStream) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            provider: stream.source.clone(),
            name: stream.name.clone(),
            title: stream.title.clone(),
            quality: stream.quality,
            size: stream.format_size(),
            seeders: stream.seeders,
            cached: stream.cached,
            info_hash: non_empty(&stream.info_hash),
            url: non_empty(&stream.url),
            magnet: (!stream.info_hash.is_empty()).then(|| stream.to_magnet(&stream.title)),
            play_url: None,
        }
    }
}

/// Provider health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub provider: String,
    pub status: &'static str,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// IMDB ID Validation
// =============================================================================

/// Validate IMDB ID format (tt followed by digits)
pub fn validate_imdb_id(id: &str) -> Result<&str, &'static str> {
    match id.strip_prefix("tt") {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => Ok(id),
        _ => Err("Invalid IMDB ID format (expected tt followed by digits)"),
    }
}

// =============================================================================
// Tests
// =============================================================================
