//! VidSrc direct-play client
//!
//! The API wants a `vrf` token: the request path XOR-ed with a rotating key
//! and base64 encoded. The key is served as the raw body of a static image
//! asset, so it is fetched fresh on every lookup.

use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{get_bytes, get_json, http_client, IdResolver, StreamProvider};
use crate::cache::{content_key, ResponseCache, ADDON_CACHE_TTL};
use crate::error::ProviderError;
use crate::models::{EpisodeRef, MediaType, NormalizedStream, StreamFormat};
use crate::parse;

pub const VIDSRC_URL: &str = "https://vidsrc.to";

/// Static asset whose bytes are the XOR key
pub const KEY_ASSET_PATH: &str = "/assets/img/logo.png";

/// Upstream sources, tried in order
pub const SOURCES: &[&str] = &["vidplay", "filemoon", "upcloud"];

const PROVIDER: &str = "vidsrc";
const TIMEOUT: Duration = Duration::from_secs(10);

/// XOR `path` against the key cycled to its length, then base64 encode
pub fn compute_vrf(key: &[u8], path: &str) -> String {
    let xored: Vec<u8> = path
        .bytes()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect();
    base64::engine::general_purpose::STANDARD.encode(xored)
}

/// API path a VRF token is computed over
pub fn api_path(source: &str, tmdb_id: u64) -> String {
    format!("/api/source/{}/{}", source, tmdb_id)
}

/// Direct URLs are HLS when they point at a playlist, MP4 otherwise
pub fn classify_format(url: &str) -> StreamFormat {
    StreamFormat::from_url(url).unwrap_or(StreamFormat::Mp4)
}

#[derive(Debug, Deserialize)]
struct SourceResponse {
    #[serde(default)]
    sources: Vec<SourceFile>,
}

#[derive(Debug, Deserialize)]
struct SourceFile {
    file: String,
    #[serde(default)]
    label: Option<String>,
}

/// VidSrc client; needs an IMDB to TMDB resolver
pub struct VidSrcProvider {
    base_url: String,
    client: reqwest::Client,
    resolver: Arc<dyn IdResolver>,
    cache: ResponseCache<Vec<NormalizedStream>>,
}

impl VidSrcProvider {
    pub fn new(resolver: Arc<dyn IdResolver>) -> Self {
        Self::with_base_url(VIDSRC_URL, resolver)
    }

    /// Create a client with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>, resolver: Arc<dyn IdResolver>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(TIMEOUT),
            resolver,
            cache: ResponseCache::new(ADDON_CACHE_TTL),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ResponseCache::new(ttl);
        self
    }

    async fn fetch_key(&self) -> Result<Vec<u8>, ProviderError> {
        let url = format!("{}{}", self.base_url, KEY_ASSET_PATH);
        let key = get_bytes(&self.client, PROVIDER, &url).await?;
        if key.is_empty() {
            return Err(ProviderError::decode(PROVIDER, "empty key asset"));
        }
        Ok(key)
    }

    fn source_url(&self, key: &[u8], source: &str, tmdb_id: u64, episode: Option<EpisodeRef>) -> String {
        let path = api_path(source, tmdb_id);
        let vrf = compute_vrf(key, &path);
        let mut url = format!(
            "{}{}?vrf={}",
            self.base_url,
            path,
            urlencoding::encode(&vrf)
        );
        if let Some(ep) = episode {
            url.push_str(&format!("&s={}&e={}", ep.season, ep.episode));
        }
        url
    }

    async fn streams(
        &self,
        media: MediaType,
        imdb_id: &str,
        episode: Option<EpisodeRef>,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        let cache_key = content_key(media, imdb_id, episode);
        if let Some(streams) = self.cache.get_fresh(&cache_key) {
            debug!(provider = PROVIDER, key = %cache_key, "cache hit");
            return Ok(streams);
        }

        let tmdb_id = self.resolver.tmdb_id(imdb_id, media).await?;
        let key = self.fetch_key().await?;

        let mut streams = Vec::new();
        for source in SOURCES {
            let url = self.source_url(&key, source, tmdb_id, episode);
            match get_json::<SourceResponse>(&self.client, PROVIDER, &url).await {
                Ok(response) => {
                    debug!(provider = PROVIDER, source, count = response.sources.len(), "source answered");
                    streams.extend(
                        response
                            .sources
                            .into_iter()
                            .filter(|s| !s.file.is_empty())
                            .map(|s| to_stream(source, s)),
                    );
                }
                Err(err) => debug!(provider = PROVIDER, source, error = %err, "source failed"),
            }
        }

        if streams.is_empty() {
            return Err(ProviderError::NoStreamFound(PROVIDER.to_string()));
        }

        self.cache.put(cache_key, streams.clone());
        Ok(streams)
    }
}

fn to_stream(source: &str, file: SourceFile) -> NormalizedStream {
    let format = classify_format(&file.file);
    let label = file.label.unwrap_or_default();
    let quality = match parse::extract_quality(&label) {
        q if q.is_resolution() => q,
        _ => parse::extract_quality(&file.file),
    };

    NormalizedStream {
        name: format!("VidSrc {} ({})", source, format),
        title: if label.is_empty() { source.to_string() } else { label },
        info_hash: String::new(),
        file_idx: None,
        url: file.file,
        quality,
        size_bytes: 0,
        seeders: 0,
        cached: true,
        source: PROVIDER.to_string(),
        format: Some(format),
    }
}

#[async_trait::async_trait]
impl StreamProvider for VidSrcProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn movie_streams(&self, imdb_id: &str) -> Result<Vec<NormalizedStream>, ProviderError> {
        self.streams(MediaType::Movie, imdb_id, None).await
    }

    async fn series_streams(
        &self,
        imdb_id: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        self.streams(
            MediaType::Series,
            imdb_id,
            Some(EpisodeRef::new(season, episode)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vrf_cycles_key() {
        // "ab" ^ [1] = [0x60, 0x63]
        assert_eq!(compute_vrf(&[1], "ab"), base64::engine::general_purpose::STANDARD.encode([0x60, 0x63]));
    }

    #[test]
    fn test_vrf_is_reversible() {
        let key = b"k3y";
        let path = api_path("vidplay", 414906);
        let raw = base64::engine::general_purpose::STANDARD
            .decode(compute_vrf(key, &path))
            .unwrap();
        let back: Vec<u8> = raw.iter().zip(key.iter().cycle()).map(|(b, k)| b ^ k).collect();
        assert_eq!(String::from_utf8(back).unwrap(), "/api/source/vidplay/414906");
    }

    #[test]
    fn test_classify_format() {
        assert_eq!(classify_format("https://cdn.example/hls/master.m3u8"), StreamFormat::M3u8);
        assert_eq!(classify_format("https://cdn.example/v.mp4"), StreamFormat::Mp4);
        assert_eq!(classify_format("https://cdn.example/stream"), StreamFormat::Mp4);
    }

    #[test]
    fn test_to_stream_is_cached_direct_url() {
        let stream = to_stream(
            "vidplay",
            SourceFile {
                file: "https://cdn.example/master.m3u8".to_string(),
                label: Some("1080p".to_string()),
            },
        );
        assert!(stream.cached);
        assert!(stream.info_hash.is_empty());
        assert_eq!(stream.quality.value(), 1080);
        assert_eq!(stream.format, Some(StreamFormat::M3u8));
        assert_eq!(stream.name, "VidSrc vidplay (m3u8)");
    }
}
