//! AutoEmbed direct-play scraper
//!
//! The embed page lists servers as base64 tokens (`data-server="..."`) next
//! to country flag icons (`<img src="...">`). Servers whose flag matches an
//! allowed region are decoded and fetched; the player page then exposes the
//! media URL as a `file:"..."` literal.

use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{get_text, http_client, IdResolver, StreamProvider};
use crate::cache::{content_key, ResponseCache, ADDON_CACHE_TTL};
use crate::error::ProviderError;
use crate::models::{EpisodeRef, MediaType, NormalizedStream, StreamFormat};
use crate::parse;

pub const AUTOEMBED_URL: &str = "https://autoembed.cc";

const PROVIDER: &str = "autoembed";
const TIMEOUT: Duration = Duration::from_secs(25);

const DEFAULT_REGIONS: &[&str] = &["US", "EU", "UK"];
const ENGLISH_REGIONS: &[&str] = &["GB", "US"];

/// Regions to scrape for a caller language or region code
pub fn regions_for_language(language: &str) -> &'static [&'static str] {
    match language.to_lowercase().as_str() {
        "en" | "gb" | "us" => ENGLISH_REGIONS,
        _ => DEFAULT_REGIONS,
    }
}

/// Pair every server token with the flag icon at the same position
pub fn extract_servers(html: &str) -> Vec<(String, String)> {
    let (Ok(server_re), Ok(flag_re)) = (
        regex::Regex::new(r#"data-server="([^"]+)""#),
        regex::Regex::new(r#"<img src="([^"]+)""#),
    ) else {
        return Vec::new();
    };

    let servers = server_re.captures_iter(html).map(|c| c[1].to_string());
    let flags = flag_re.captures_iter(html).map(|c| c[1].to_string());
    servers.zip(flags).collect()
}

/// Country code from a flag icon URL (`.../us.png` -> `US`)
pub fn flag_country(flag_url: &str) -> Option<String> {
    let path = flag_url.split(['?', '#']).next().unwrap_or(flag_url);
    let file = path.rsplit('/').next()?;
    let code = file.split('.').next()?;
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(code.to_uppercase())
}

/// UK and GB name the same flag
fn same_region(a: &str, b: &str) -> bool {
    let canon = |c: &str| if c.eq_ignore_ascii_case("UK") { "GB".to_string() } else { c.to_uppercase() };
    canon(a) == canon(b)
}

/// Decode a server token into the secondary player URL
pub fn decode_server(token: &str) -> Option<String> {
    let engines = [
        base64::engine::general_purpose::STANDARD,
        base64::engine::general_purpose::URL_SAFE,
    ];
    engines
        .iter()
        .find_map(|engine| engine.decode(token.trim()).ok())
        .and_then(|raw| String::from_utf8(raw).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pull the media URL out of a `file:"..."` or `"file":"..."` literal
pub fn extract_file_url(body: &str) -> Option<String> {
    let re = regex::Regex::new(r#"(?:^|[^A-Za-z0-9_])"?file"?\s*:\s*"([^"]+)""#).ok()?;
    let caps = re.captures(body)?;
    Some(caps[1].replace("\\/", "/"))
}

/// AutoEmbed scraper; needs an IMDB to TMDB resolver
pub struct AutoEmbedProvider {
    base_url: String,
    client: reqwest::Client,
    resolver: Arc<dyn IdResolver>,
    regions: Vec<String>,
    cache: ResponseCache<Vec<NormalizedStream>>,
}

impl AutoEmbedProvider {
    pub fn new(resolver: Arc<dyn IdResolver>) -> Self {
        Self::with_base_url(AUTOEMBED_URL, resolver)
    }

    /// Create a scraper with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>, resolver: Arc<dyn IdResolver>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(TIMEOUT),
            resolver,
            regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
            cache: ResponseCache::new(ADDON_CACHE_TTL),
        }
    }

    /// Pick the region set from the caller's language or region code
    pub fn with_language(mut self, language: &str) -> Self {
        self.regions = regions_for_language(language)
            .iter()
            .map(|r| r.to_string())
            .collect();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ResponseCache::new(ttl);
        self
    }

    pub fn embed_url(&self, tmdb_id: u64, episode: Option<EpisodeRef>, region: &str) -> String {
        match episode {
            Some(ep) => format!(
                "{}/embed/tv/{}/{}/{}?region={}",
                self.base_url, tmdb_id, ep.season, ep.episode, region
            ),
            None => format!("{}/embed/movie/{}?region={}", self.base_url, tmdb_id, region),
        }
    }

    fn is_allowed(&self, country: &str) -> bool {
        self.regions.iter().any(|r| same_region(r, country))
    }

    async fn streams(
        &self,
        media: MediaType,
        imdb_id: &str,
        episode: Option<EpisodeRef>,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        let key = content_key(media, imdb_id, episode);
        if let Some(streams) = self.cache.get_fresh(&key) {
            debug!(provider = PROVIDER, %key, "cache hit");
            return Ok(streams);
        }

        let tmdb_id = self.resolver.tmdb_id(imdb_id, media).await?;

        for region in &self.regions {
            match self.scrape_region(tmdb_id, episode, region).await {
                Ok(stream) => {
                    let streams = vec![stream];
                    self.cache.put(key, streams.clone());
                    return Ok(streams);
                }
                Err(err) => debug!(provider = PROVIDER, %region, error = %err, "region yielded nothing"),
            }
        }

        Err(ProviderError::NoStreamFound(PROVIDER.to_string()))
    }

    /// First playable file URL for one region's embed page
    async fn scrape_region(
        &self,
        tmdb_id: u64,
        episode: Option<EpisodeRef>,
        region: &str,
    ) -> Result<NormalizedStream, ProviderError> {
        let page = get_text(&self.client, PROVIDER, &self.embed_url(tmdb_id, episode, region)).await?;
        let servers = extract_servers(&page);
        if servers.is_empty() {
            return Err(ProviderError::NoStreamFound(PROVIDER.to_string()));
        }

        for (token, flag) in &servers {
            let Some(country) = flag_country(flag) else {
                continue;
            };
            if !self.is_allowed(&country) {
                continue;
            }
            let Some(player_url) = decode_server(token) else {
                continue;
            };
            let player_url = if player_url.starts_with('/') {
                format!("{}{}", self.base_url, player_url)
            } else {
                player_url
            };

            let body = match get_text(&self.client, PROVIDER, &player_url).await {
                Ok(body) => body,
                Err(err) => {
                    debug!(provider = PROVIDER, %country, error = %err, "server fetch failed");
                    continue;
                }
            };

            if let Some(file) = extract_file_url(&body) {
                return Ok(NormalizedStream {
                    name: format!("AutoEmbed {}", country),
                    title: format!("AutoEmbed ({})", region),
                    info_hash: String::new(),
                    file_idx: None,
                    quality: parse::extract_quality(&file),
                    format: StreamFormat::from_url(&file),
                    url: file,
                    size_bytes: 0,
                    seeders: 0,
                    cached: true,
                    source: PROVIDER.to_string(),
                });
            }
        }

        Err(ProviderError::NoStreamFound(PROVIDER.to_string()))
    }
}

#[async_trait::async_trait]
impl StreamProvider for AutoEmbedProvider {
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
    fn test_regions_for_language() {
        assert_eq!(regions_for_language("en"), &["GB", "US"]);
        assert_eq!(regions_for_language("US"), &["GB", "US"]);
        assert_eq!(regions_for_language("fr"), &["US", "EU", "UK"]);
    }

    #[test]
    fn test_extract_servers_pairs_tokens_with_flags() {
        let html = r#"
            <li data-server="aHR0cHM6Ly9hLmV4YW1wbGU="><img src="https://flagcdn.com/16x12/us.png"></li>
            <li data-server="aHR0cHM6Ly9iLmV4YW1wbGU="><img src="https://flagcdn.com/16x12/fr.png"></li>
        "#;
        let servers = extract_servers(html);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].0, "aHR0cHM6Ly9hLmV4YW1wbGU=");
        assert_eq!(flag_country(&servers[1].1).as_deref(), Some("FR"));
    }

    #[test]
    fn test_flag_country() {
        assert_eq!(flag_country("https://flagcdn.com/16x12/gb.png").as_deref(), Some("GB"));
        assert_eq!(flag_country("/flags/us.svg?v=2").as_deref(), Some("US"));
        assert_eq!(flag_country("https://x.example/"), None);
    }

    #[test]
    fn test_uk_matches_gb_flag() {
        assert!(same_region("UK", "GB"));
        assert!(same_region("us", "US"));
        assert!(!same_region("EU", "US"));
    }

    #[test]
    fn test_decode_server() {
        assert_eq!(
            decode_server("aHR0cHM6Ly9hLmV4YW1wbGU=").as_deref(),
            Some("https://a.example")
        );
        assert_eq!(decode_server("%%%"), None);
    }

    #[test]
    fn test_extract_file_url_variants() {
        assert_eq!(
            extract_file_url(r#"player.setup({file:"https://cdn.example/v.m3u8"})"#).as_deref(),
            Some("https://cdn.example/v.m3u8")
        );
        assert_eq!(
            extract_file_url(r#"{"file":"https:\/\/cdn.example\/v.mp4","label":"HD"}"#).as_deref(),
            Some("https://cdn.example/v.mp4")
        );
        assert_eq!(extract_file_url("<html>nothing</html>"), None);
    }

    #[test]
    fn test_extract_file_url_skips_other_file_keys() {
        let body = r#"{"subtitle_file":"https://cdn.example/en.vtt","file":"https://cdn.example/v.m3u8"}"#;
        assert_eq!(
            extract_file_url(body).as_deref(),
            Some("https://cdn.example/v.m3u8")
        );
        assert_eq!(
            extract_file_url(r#"{profile:"https://cdn.example/p.jpg"}"#),
            None
        );
    }
}
