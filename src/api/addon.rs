//! Stremio-protocol addon provider
//!
//! Fetches stream sources from Comet, MediaFusion, Torrentio or any other
//! addon speaking `/stream/{type}/{id}.json`. Debrid credentials are encoded
//! into a config path segment whose shape depends on the addon kind.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::ratelimit::RateLimiter;
use super::{http_client, retain_playable, StreamProvider};
use crate::cache::{content_key, ResponseCache, ADDON_CACHE_TTL};
use crate::error::ProviderError;
use crate::models::{EpisodeRef, MediaType, NormalizedStream};
use crate::parse;

pub const TORRENTIO_URL: &str = "https://torrentio.strem.fun";
pub const COMET_URL: &str = "https://comet.elfhosted.com";
pub const MEDIAFUSION_URL: &str = "https://mediafusion.elfhosted.com";

const KNOWN_ADDON_TIMEOUT: Duration = Duration::from_secs(15);
const GENERIC_ADDON_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Addon Kind
// =============================================================================

/// Config encoding family of an addon, resolved once at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddonKind {
    Comet,
    Torrentio,
    MediaFusion,
    Generic,
}

impl AddonKind {
    /// Sniff the kind from a declared name, then from the URL
    pub fn detect(name: &str, url: &str) -> Self {
        Self::sniff(name)
            .or_else(|| Self::sniff(url))
            .unwrap_or(AddonKind::Generic)
    }

    fn sniff(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("comet") {
            Some(AddonKind::Comet)
        } else if lower.contains("torrentio") {
            Some(AddonKind::Torrentio)
        } else if lower.contains("mediafusion") {
            Some(AddonKind::MediaFusion)
        } else {
            None
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            AddonKind::Generic => GENERIC_ADDON_TIMEOUT,
            _ => KNOWN_ADDON_TIMEOUT,
        }
    }

    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            AddonKind::Comet => Some(COMET_URL),
            AddonKind::Torrentio => Some(TORRENTIO_URL),
            AddonKind::MediaFusion => Some(MEDIAFUSION_URL),
            AddonKind::Generic => None,
        }
    }
}

// =============================================================================
// Debrid Settings
// =============================================================================

/// Debrid credentials and indexer selection embedded in addon URLs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebridSettings {
    /// Service identifier, e.g. `realdebrid`
    pub service: String,
    pub token: String,
    pub indexers: Vec<String>,
}

impl DebridSettings {
    /// Config path segment for the given addon kind; empty when unconfigured
    ///
    /// Torrentio takes an inline pipe-delimited string. Comet takes base64
    /// JSON. MediaFusion and unrecognized addons take the MediaFusion shape.
    pub fn config_segment(&self, kind: AddonKind) -> String {
        match kind {
            AddonKind::Torrentio => self.torrentio_config(),
            AddonKind::Comet => encode_json(&serde_json::json!({
                "indexers": self.indexers,
                "maxResults": 0,
                "resolutions": ["All"],
                "languages": ["All"],
                "debridService": self.service,
                "debridApiKey": self.token,
            })),
            AddonKind::MediaFusion | AddonKind::Generic => encode_json(&serde_json::json!({
                "streaming_provider": {
                    "service": self.service,
                    "token": self.token,
                },
                "selected_resolutions": ["4k", "2160p", "1080p", "720p", "480p"],
                "torrent_sorting_priority": ["cached", "resolution", "size"],
            })),
        }
    }

    fn torrentio_config(&self) -> String {
        let mut parts = Vec::new();
        if !self.indexers.is_empty() {
            parts.push(format!("providers={}", self.indexers.join(",")));
        }
        if !self.token.is_empty() && !self.service.is_empty() {
            parts.push(format!("{}={}", self.service, self.token));
        }
        parts.join("|")
    }
}

fn encode_json(value: &serde_json::Value) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(value.to_string())
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct AddonResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddonStream {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    info_hash: Option<String>,
    #[serde(default)]
    file_idx: Option<u32>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    behavior_hints: Option<BehaviorHints>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BehaviorHints {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    video_size: Option<i64>,
}

impl AddonStream {
    /// Convert an addon entry into the normalized model
    fn into_normalized(self, source: &str) -> NormalizedStream {
        let name = self.name.unwrap_or_default();
        let description = self.title.or(self.description).unwrap_or_default();
        let hints = self.behavior_hints.unwrap_or_default();

        let mut quality = parse::extract_quality(&name);
        if !quality.is_resolution() {
            quality = parse::extract_quality(&description);
        }

        let size_bytes = match hints.video_size {
            Some(size) if size > 0 => size,
            _ => match parse::parse_size_from_text(&description) {
                0 => parse::parse_size_from_text(&name),
                size => size,
            },
        };

        let cached = parse::is_cached_marker(&name) || parse::is_cached_marker(&description);
        let seeders = parse::parse_seeds(&description);

        let title = hints
            .filename
            .filter(|f| !f.is_empty())
            .or_else(|| {
                description
                    .lines()
                    .next()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| name.clone());

        NormalizedStream {
            name,
            title,
            info_hash: self.info_hash.unwrap_or_default().to_lowercase(),
            file_idx: self.file_idx,
            url: self.url.unwrap_or_default(),
            quality,
            size_bytes,
            seeders,
            cached,
            source: source.to_string(),
            format: None,
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Stremio addon provider with a 30 minute response cache
pub struct AddonProvider {
    name: String,
    kind: AddonKind,
    base_url: String,
    config: String,
    client: reqwest::Client,
    cache: ResponseCache<Vec<NormalizedStream>>,
    limiter: Option<RateLimiter>,
}

impl AddonProvider {
    /// Create a provider for an addon of a known kind
    ///
    /// Generic addons get the rate limiter; known addons do not.
    pub fn new(
        name: impl Into<String>,
        kind: AddonKind,
        base_url: impl Into<String>,
        debrid: &DebridSettings,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: debrid.config_segment(kind),
            client: http_client(kind.timeout()),
            cache: ResponseCache::new(ADDON_CACHE_TTL),
            limiter: (kind == AddonKind::Generic).then(RateLimiter::new),
        }
    }

    /// Create a provider for a user-configured addon, sniffing the kind
    /// unless one is given explicitly
    pub fn from_addon(
        name: impl Into<String>,
        url: impl Into<String>,
        kind: Option<AddonKind>,
        debrid: &DebridSettings,
    ) -> Self {
        let name = name.into();
        let url = url.into();
        let kind = kind.unwrap_or_else(|| AddonKind::detect(&name, &url));
        Self::new(name, kind, url, debrid)
    }

    pub fn torrentio(debrid: &DebridSettings) -> Self {
        Self::new("torrentio", AddonKind::Torrentio, TORRENTIO_URL, debrid)
    }

    pub fn comet(debrid: &DebridSettings) -> Self {
        Self::new("comet", AddonKind::Comet, COMET_URL, debrid)
    }

    pub fn mediafusion(debrid: &DebridSettings) -> Self {
        Self::new("mediafusion", AddonKind::MediaFusion, MEDIAFUSION_URL, debrid)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ResponseCache::new(ttl);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn kind(&self) -> AddonKind {
        self.kind
    }

    pub fn is_rate_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// `base/<config>/stream/<type>/<id>[:s:e].json`, config omitted when empty
    pub fn stream_url(&self, media: MediaType, imdb_id: &str, episode: Option<EpisodeRef>) -> String {
        let id = match episode {
            Some(ep) => format!("{}:{}:{}", imdb_id, ep.season, ep.episode),
            None => imdb_id.to_string(),
        };

        if self.config.is_empty() {
            format!("{}/stream/{}/{}.json", self.base_url, media, id)
        } else {
            format!(
                "{}/{}/stream/{}/{}.json",
                self.base_url, self.config, media, id
            )
        }
    }

    async fn streams(
        &self,
        media: MediaType,
        imdb_id: &str,
        episode: Option<EpisodeRef>,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        let key = content_key(media, imdb_id, episode);
        if let Some(streams) = self.cache.get_fresh(&key) {
            debug!(provider = %self.name, %key, "cache hit");
            return Ok(streams);
        }

        let url = self.stream_url(media, imdb_id, episode);
        debug!(provider = %self.name, kind = ?self.kind, %key, "fetching addon streams");

        let streams = match &self.limiter {
            Some(limiter) => {
                let url: &str = &url;
                limiter.run(&self.name, move || self.fetch(url)).await?
            }
            None => self.fetch(&url).await?,
        };

        self.cache.put(key, streams.clone());
        Ok(streams)
    }

    /// Fetch and parse streams from an addon URL
    async fn fetch(&self, url: &str) -> Result<Vec<NormalizedStream>, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::transport(&self.name, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NoResults(self.name.clone()));
        }
        if !status.is_success() {
            return Err(ProviderError::status(&self.name, status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(&self.name, e))?;

        let data: AddonResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(&self.name, format!("JSON parse error: {}", e)))?;

        let mut streams: Vec<NormalizedStream> = data
            .streams
            .into_iter()
            .map(|s| s.into_normalized(&self.name))
            .collect();
        retain_playable(&mut streams);

        Ok(streams)
    }
}

#[async_trait::async_trait]
impl StreamProvider for AddonProvider {
    fn name(&self) -> &str {
        &self.name
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

    fn debrid() -> DebridSettings {
        DebridSettings {
            service: "realdebrid".to_string(),
            token: "TOKEN".to_string(),
            indexers: vec!["yts".to_string(), "eztv".to_string()],
        }
    }

    fn decode_segment(segment: &str) -> serde_json::Value {
        let raw = base64::engine::general_purpose::URL_SAFE
            .decode(segment)
            .unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn test_detect_kind_from_name_then_url() {
        assert_eq!(AddonKind::detect("Comet RD", "https://x.example"), AddonKind::Comet);
        assert_eq!(
            AddonKind::detect("my addon", "https://torrentio.strem.fun"),
            AddonKind::Torrentio
        );
        assert_eq!(
            AddonKind::detect("MediaFusion", "https://torrentio.example"),
            AddonKind::MediaFusion
        );
        assert_eq!(AddonKind::detect("peerflix", "https://p.example"), AddonKind::Generic);
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(AddonKind::Torrentio.timeout(), Duration::from_secs(15));
        assert_eq!(AddonKind::Generic.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_torrentio_config_is_pipe_delimited() {
        assert_eq!(
            debrid().config_segment(AddonKind::Torrentio),
            "providers=yts,eztv|realdebrid=TOKEN"
        );
        assert_eq!(DebridSettings::default().config_segment(AddonKind::Torrentio), "");
    }

    #[test]
    fn test_comet_config_is_base64_json() {
        let json = decode_segment(&debrid().config_segment(AddonKind::Comet));
        assert_eq!(json["debridService"], "realdebrid");
        assert_eq!(json["debridApiKey"], "TOKEN");
        assert_eq!(json["indexers"][1], "eztv");
    }

    #[test]
    fn test_generic_uses_mediafusion_shape() {
        let settings = debrid();
        assert_eq!(
            settings.config_segment(AddonKind::Generic),
            settings.config_segment(AddonKind::MediaFusion)
        );
        let json = decode_segment(&settings.config_segment(AddonKind::Generic));
        assert_eq!(json["streaming_provider"]["token"], "TOKEN");
    }

    #[test]
    fn test_stream_url_shapes() {
        let plain = AddonProvider::new(
            "torrentio",
            AddonKind::Torrentio,
            "https://torrentio.strem.fun/",
            &DebridSettings::default(),
        );
        assert_eq!(
            plain.stream_url(MediaType::Movie, "tt1877830", None),
            "https://torrentio.strem.fun/stream/movie/tt1877830.json"
        );
        assert_eq!(
            plain.stream_url(MediaType::Series, "tt0903747", Some(EpisodeRef::new(1, 2))),
            "https://torrentio.strem.fun/stream/series/tt0903747:1:2.json"
        );

        let configured = AddonProvider::torrentio(&debrid());
        assert_eq!(
            configured.stream_url(MediaType::Movie, "tt1", None),
            "https://torrentio.strem.fun/providers=yts,eztv|realdebrid=TOKEN/stream/movie/tt1.json"
        );
    }

    #[test]
    fn test_only_generic_is_rate_limited() {
        let settings = DebridSettings::default();
        assert!(!AddonProvider::comet(&settings).is_rate_limited());
        assert!(AddonProvider::from_addon("peerflix", "https://p.example", None, &settings)
            .is_rate_limited());
        assert_eq!(
            AddonProvider::from_addon("x", "https://x.example", Some(AddonKind::Comet), &settings)
                .kind(),
            AddonKind::Comet
        );
    }

    #[test]
    fn test_normalize_prefers_explicit_fields() {
        let stream = AddonStream {
            name: Some("[RD+] Torrentio\n4k".to_string()),
            title: Some("The.Batman.2022.2160p\n👤 89 💾 4.2 GB".to_string()),
            info_hash: Some("ABC123".to_string()),
            file_idx: Some(1),
            behavior_hints: Some(BehaviorHints {
                filename: Some("The.Batman.2022.2160p.mkv".to_string()),
                video_size: Some(1234),
            }),
            ..Default::default()
        }
        .into_normalized("torrentio");

        assert_eq!(stream.title, "The.Batman.2022.2160p.mkv");
        assert_eq!(stream.size_bytes, 1234);
        assert_eq!(stream.info_hash, "abc123");
        assert_eq!(stream.seeders, 89);
        assert!(stream.cached);
        assert_eq!(stream.quality.value(), 2160);
        assert_eq!(stream.source, "torrentio");
    }

    #[test]
    fn test_normalize_falls_back_to_text_scan() {
        let stream = AddonStream {
            name: Some("Comet\n1080p".to_string()),
            description: Some("Movie.1080p.WEB\n💾 1.5 GB".to_string()),
            url: Some("https://debrid.example/dl/1".to_string()),
            ..Default::default()
        }
        .into_normalized("comet");

        assert_eq!(stream.title, "Movie.1080p.WEB");
        assert_eq!(stream.size_bytes, 1_610_612_736);
        assert!(!stream.cached);
        assert!(stream.info_hash.is_empty());
    }
}
