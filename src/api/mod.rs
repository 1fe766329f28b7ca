//! Upstream stream providers
//!
//! - Addons: Comet, MediaFusion, Torrentio and generic Stremio addons
//! - Zilean: debrid hash database
//! - AutoEmbed / VidSrc: direct-play scrapers
//! - TMDB: IMDB to TMDB id resolution for the scrapers

pub mod addon;
pub mod autoembed;
pub mod ratelimit;
pub mod tmdb;
pub mod vidsrc;
pub mod zilean;

pub use addon::{AddonKind, AddonProvider};
pub use autoembed::AutoEmbedProvider;
pub use ratelimit::RateLimiter;
pub use tmdb::TmdbClient;
pub use vidsrc::VidSrcProvider;
pub use zilean::ZileanProvider;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;
use crate::models::{MediaType, NormalizedStream};

/// Desktop browser user agent sent with every upstream request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Capability set every provider implements
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Short lowercase identifier, stamped on every stream as `source`
    fn name(&self) -> &str;

    async fn movie_streams(&self, imdb_id: &str) -> Result<Vec<NormalizedStream>, ProviderError>;

    async fn series_streams(
        &self,
        imdb_id: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<NormalizedStream>, ProviderError>;
}

/// IMDB to TMDB id lookup, consumed by the scrape providers
#[async_trait]
pub trait IdResolver: Send + Sync {
    async fn tmdb_id(&self, imdb_id: &str, media: MediaType) -> Result<u64, ProviderError>;
}

/// Build an HTTP client with the shared user agent and a request timeout
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// GET a URL and return the body, mapping transport and status failures
pub(crate) async fn get_text(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
) -> Result<String, ProviderError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        debug!(provider, status = status.as_u16(), "upstream returned error status");
        return Err(ProviderError::status(provider, status.as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::transport(provider, e))
}

/// GET a URL and decode the JSON body
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
) -> Result<T, ProviderError> {
    let body = get_text(client, provider, url).await?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::decode(provider, format!("JSON parse error: {}", e)))
}

/// GET a URL and return the raw body bytes
pub(crate) async fn get_bytes(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
) -> Result<Vec<u8>, ProviderError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::status(provider, status.as_u16()));
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| ProviderError::transport(provider, e))
}

/// Drop streams with neither a URL nor a hash
pub(crate) fn retain_playable(streams: &mut Vec<NormalizedStream>) {
    streams.retain(NormalizedStream::is_playable);
}
