//! TMDB (The Movie Database) id resolver
//!
//! The scrape providers address content by TMDB id; this client maps IMDB
//! ids onto TMDB ids through the `/find` endpoint.
//! API docs: https://developer.themoviedb.org/reference/find-by-id

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use super::{IdResolver, USER_AGENT};
use crate::cache::ResponseCache;
use crate::error::ProviderError;
use crate::models::MediaType;

const PROVIDER: &str = "tmdb";
const ID_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// TMDB API client
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
    ids: ResponseCache<u64>,
}

impl TmdbClient {
    /// Create a new TMDB client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.themoviedb.org/3")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            max_retries: 3,
            ids: ResponseCache::new(ID_CACHE_TTL),
        }
    }

    /// Make an authenticated GET request with retry logic for rate limits
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut retries = 0;

        loop {
            let response = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| ProviderError::transport(PROVIDER, e))?;

            match response.status() {
                StatusCode::OK => {
                    let body = response
                        .text()
                        .await
                        .map_err(|e| ProviderError::transport(PROVIDER, e))?;
                    return serde_json::from_str(&body).map_err(|e| {
                        ProviderError::decode(PROVIDER, format!("JSON parse error: {}", e))
                    });
                }
                StatusCode::NOT_FOUND => {
                    return Err(ProviderError::NoResults(PROVIDER.to_string()));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(ProviderError::status(PROVIDER, 429));
                    }

                    // Retry-After header or exponential backoff
                    let wait_secs = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(2u64.pow(retries));

                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }
                status => {
                    return Err(ProviderError::status(PROVIDER, status.as_u16()));
                }
            }
        }
    }

    /// Look up the TMDB id of an IMDB title
    pub async fn find_by_imdb(&self, imdb_id: &str, media: MediaType) -> Result<u64, ProviderError> {
        let key = format!("{}:{}", media, imdb_id);
        if let Some(id) = self.ids.get_fresh(&key) {
            return Ok(id);
        }

        let endpoint = format!(
            "/find/{}?external_source=imdb_id",
            urlencoding::encode(imdb_id)
        );
        let response: FindResponse = self.get(&endpoint).await?;
        let id = response
            .pick(media)
            .ok_or_else(|| ProviderError::NoResults(PROVIDER.to_string()))?;

        self.ids.put(key, id);
        Ok(id)
    }
}

#[async_trait]
impl IdResolver for TmdbClient {
    async fn tmdb_id(&self, imdb_id: &str, media: MediaType) -> Result<u64, ProviderError> {
        self.find_by_imdb(imdb_id, media).await
    }
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindResult>,
    #[serde(default)]
    tv_results: Vec<FindResult>,
}

#[derive(Debug, Deserialize)]
struct FindResult {
    id: u64,
}

impl FindResponse {
    fn pick(&self, media: MediaType) -> Option<u64> {
        let results = match media {
            MediaType::Movie => &self.movie_results,
            MediaType::Series => &self.tv_results,
        };
        results.first().map(|r| r.id)
    }
}
