//! Per-provider response cache
//!
//! Each provider owns one [`ResponseCache`]. Entries are overwritten in
//! place on refresh and never evicted otherwise.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::{EpisodeRef, MediaType};

/// TTL used by the addon-style providers
pub const ADDON_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// TTL used by the hash-database provider
pub const HASH_DB_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

/// Time-bounded map guarded by its own mutex
pub struct ResponseCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key; the flag is false once the entry is older than the TTL
    pub fn get(&self, key: &str) -> Option<(T, bool)> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.stored_at.elapsed() <= self.ttl))
    }

    /// Fresh value only
    pub fn get_fresh(&self, key: &str) -> Option<T> {
        match self.get(key) {
            Some((value, true)) => Some(value),
            _ => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: T) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deterministic key for a movie or episode lookup
pub fn content_key(media: MediaType, imdb_id: &str, episode: Option<EpisodeRef>) -> String {
    match episode {
        Some(ep) => format!("{}:{}:{}:{}", media, imdb_id, ep.season, ep.episode),
        None => format!("{}:{}", media, imdb_id),
    }
}

/// Key for a free-text lookup
pub fn query_key(query: &str) -> String {
    format!("query:{}", query.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get_is_fresh() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("movie:tt1", vec![1, 2, 3]);
        assert_eq!(cache.get("movie:tt1"), Some((vec![1, 2, 3], true)));
        assert_eq!(cache.get_fresh("movie:tt1"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get("movie:tt2"), None);
    }

    #[test]
    fn test_entry_goes_stale_after_ttl() {
        let cache = ResponseCache::new(Duration::from_millis(5));
        cache.put("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), Some(("v".to_string(), false)));
        assert_eq!(cache.get_fresh("k"), None);
    }

    #[test]
    fn test_put_overwrites_in_place() {
        let cache = ResponseCache::new(Duration::from_millis(5));
        cache.put("k", 1);
        std::thread::sleep(Duration::from_millis(20));
        cache.put("k", 2);
        assert_eq!(cache.get("k"), Some((2, true)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_content_keys() {
        assert_eq!(content_key(MediaType::Movie, "tt123", None), "movie:tt123");
        assert_eq!(
            content_key(MediaType::Series, "tt123", Some(EpisodeRef::new(2, 5))),
            "series:tt123:2:5"
        );
        assert_eq!(query_key("  The Batman "), "query:the batman");
    }
}
