//! streamhub - multi-provider stream aggregation
//!
//! Queries Stremio-protocol addons, a debrid hash database and direct-play
//! scrapers for a title, normalizes every answer into one stream model and
//! picks the best playable source.
//!
//! # Modules
//!
//! - `models` - Normalized stream model and quality tiers
//! - `parse` - Quality, size, seeder and cache-marker extraction
//! - `api` - Provider adapters (addons, Zilean, AutoEmbed, VidSrc, TMDB)
//! - `aggregator` - Provider registry, fan-out and best-stream selection
//! - `cache` - TTL response cache shared by the adapters
//! - `config` - TOML configuration with environment overrides
//! - `cli` / `commands` - Command-line host

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod parse;

// Re-export commonly used types
pub use aggregator::{select_best, Aggregator};
pub use api::{
    AddonKind, AddonProvider, AutoEmbedProvider, IdResolver, StreamProvider, TmdbClient,
    VidSrcProvider, ZileanProvider,
};
pub use config::Config;
pub use error::{ErrorKind, ProviderError};
pub use models::{EpisodeRef, MediaType, NormalizedStream, Quality, StreamFormat};
