//! Zilean debrid hash database
//!
//! Zilean only indexes torrents already cached at a debrid service, so every
//! result is reported as cached. Series lookups reuse the IMDB search and
//! filter filenames by episode pattern.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{get_json, get_text, http_client, retain_playable, StreamProvider};
use crate::cache::{query_key, ResponseCache, HASH_DB_CACHE_TTL};
use crate::error::ProviderError;
use crate::models::{EpisodeRef, NormalizedStream};
use crate::parse;

pub const ZILEAN_URL: &str = "https://zilean.elfhosted.com";

const PROVIDER: &str = "zilean";
const TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

/// Zilean answers either `{"torrents": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Flat(Vec<TorrentEntry>),
    Wrapped {
        #[serde(default)]
        torrents: Vec<TorrentEntry>,
    },
}

impl SearchResponse {
    fn into_entries(self) -> Vec<TorrentEntry> {
        match self {
            SearchResponse::Wrapped { torrents } => torrents,
            SearchResponse::Flat(torrents) => torrents,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TorrentEntry {
    #[serde(rename = "infoHash", alias = "info_hash", default)]
    info_hash: String,
    #[serde(alias = "raw_title", default)]
    filename: String,
    #[serde(alias = "size", default)]
    filesize: i64,
}

impl TorrentEntry {
    fn into_normalized(self) -> NormalizedStream {
        NormalizedStream {
            name: format!("Zilean\n{}", parse::filename_quality(&self.filename)),
            quality: parse::filename_quality(&self.filename),
            title: self.filename,
            info_hash: self.info_hash.to_lowercase(),
            file_idx: None,
            url: String::new(),
            size_bytes: self.filesize.max(0),
            seeders: 0,
            cached: true,
            source: PROVIDER.to_string(),
            format: None,
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Zilean hash database client with a 10 minute response cache
pub struct ZileanProvider {
    base_url: String,
    client: reqwest::Client,
    cache: ResponseCache<Vec<NormalizedStream>>,
}

impl ZileanProvider {
    pub fn new() -> Self {
        Self::with_base_url(ZILEAN_URL)
    }

    /// Create a client with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(TIMEOUT),
            cache: ResponseCache::new(HASH_DB_CACHE_TTL),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ResponseCache::new(ttl);
        self
    }

    /// Every torrent indexed for an IMDB id
    pub async fn imdb_search(&self, imdb_id: &str) -> Result<Vec<NormalizedStream>, ProviderError> {
        let key = format!("imdb:{}", imdb_id);
        let url = format!(
            "{}/imdb/search?query={}",
            self.base_url,
            urlencoding::encode(imdb_id)
        );
        self.cached_search(key, &url).await
    }

    /// Free-text search over indexed filenames
    pub async fn search(&self, query: &str) -> Result<Vec<NormalizedStream>, ProviderError> {
        let key = query_key(query);
        let url = format!(
            "{}/dmm/search?query={}",
            self.base_url,
            urlencoding::encode(query)
        );
        self.cached_search(key, &url).await
    }

    /// Liveness check for external health monitoring
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let url = format!("{}/healthchecks/ping", self.base_url);
        get_text(&self.client, PROVIDER, &url).await.map(|_| ())
    }

    async fn cached_search(
        &self,
        key: String,
        url: &str,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        if let Some(streams) = self.cache.get_fresh(&key) {
            debug!(provider = PROVIDER, %key, "cache hit");
            return Ok(streams);
        }

        debug!(provider = PROVIDER, %key, "searching hash database");
        let response: SearchResponse = get_json(&self.client, PROVIDER, url).await?;
        let mut streams: Vec<NormalizedStream> = response
            .into_entries()
            .into_iter()
            .map(TorrentEntry::into_normalized)
            .collect();
        retain_playable(&mut streams);

        self.cache.put(key, streams.clone());
        Ok(streams)
    }
}

impl Default for ZileanProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StreamProvider for ZileanProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn movie_streams(&self, imdb_id: &str) -> Result<Vec<NormalizedStream>, ProviderError> {
        self.imdb_search(imdb_id).await
    }

    async fn series_streams(
        &self,
        imdb_id: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        let ep = EpisodeRef::new(season, episode);
        let mut streams = self.imdb_search(imdb_id).await?;
        streams.retain(|s| parse::matches_episode(&s.title, ep));
        Ok(streams)
    }
}
