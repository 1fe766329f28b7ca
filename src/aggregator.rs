//! Multi-provider aggregation
//!
//! Fans a lookup out to every registered provider, concatenates results in
//! registration order and picks a single best stream on request. A failing
//! provider is logged and skipped; the call only fails when nothing was
//! found and at least one provider errored.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::addon::DebridSettings;
use crate::api::{
    AddonKind, AddonProvider, AutoEmbedProvider, IdResolver, StreamProvider, TmdbClient,
    VidSrcProvider, ZileanProvider,
};
use crate::config::Config;
use crate::error::ProviderError;
use crate::models::NormalizedStream;

/// Provider substituted when the configured list yields nothing
pub const DEFAULT_PROVIDER: &str = "torrentio";

/// Ordered, immutable provider registry plus selection policy
pub struct Aggregator {
    providers: Vec<(String, Arc<dyn StreamProvider>)>,
}

impl Aggregator {
    /// Build from an explicit provider list, kept in the given order
    pub fn new(providers: Vec<(String, Arc<dyn StreamProvider>)>) -> Self {
        Self { providers }
    }

    /// Build the registry from the enabled provider names in `config`
    ///
    /// Unknown names are logged and skipped. An empty result falls back to
    /// Torrentio alone.
    pub fn from_config(config: &Config) -> Self {
        let debrid = config.debrid_settings();
        let resolver: Option<Arc<dyn IdResolver>> = config
            .tmdb_api_key
            .as_ref()
            .map(|key| Arc::new(TmdbClient::new(key.clone())) as Arc<dyn IdResolver>);

        let mut providers: Vec<(String, Arc<dyn StreamProvider>)> = Vec::new();
        for name in &config.providers {
            match build_provider(name, config, &debrid, resolver.as_ref()) {
                Some(provider) => providers.push((name.clone(), provider)),
                None => warn!(provider = %name, "unknown or unusable provider, skipping"),
            }
        }

        if providers.is_empty() {
            warn!("no providers configured, falling back to {}", DEFAULT_PROVIDER);
            let url = config
                .torrentio_url
                .clone()
                .unwrap_or_else(|| crate::api::addon::TORRENTIO_URL.to_string());
            providers.push((
                DEFAULT_PROVIDER.to_string(),
                Arc::new(AddonProvider::new(
                    DEFAULT_PROVIDER,
                    AddonKind::Torrentio,
                    url,
                    &debrid,
                )),
            ));
        }

        info!(
            providers = ?providers.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            "provider registry built"
        );
        Self { providers }
    }

    /// Registered provider names in registration order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// All streams for a movie
    pub async fn movie_streams(&self, imdb_id: &str) -> Result<Vec<NormalizedStream>, ProviderError> {
        let results = join_all(
            self.providers
                .iter()
                .map(|(_, provider)| provider.movie_streams(imdb_id)),
        )
        .await;
        self.merge(results)
    }

    /// All streams for one episode
    pub async fn series_streams(
        &self,
        imdb_id: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        let results = join_all(
            self.providers
                .iter()
                .map(|(_, provider)| provider.series_streams(imdb_id, season, episode)),
        )
        .await;
        self.merge(results)
    }

    /// Movie or episode lookup depending on whether coordinates are given
    pub async fn streams(
        &self,
        imdb_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        match (season, episode) {
            (Some(season), Some(episode)) => self.series_streams(imdb_id, season, episode).await,
            _ => self.movie_streams(imdb_id).await,
        }
    }

    /// Single best stream not exceeding `max_quality`
    ///
    /// Falls back to the first merged stream when nothing is both cached and
    /// within the quality cap.
    pub async fn best_stream(
        &self,
        imdb_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
        max_quality: u32,
    ) -> Result<NormalizedStream, ProviderError> {
        let streams = self.streams(imdb_id, season, episode).await?;
        if streams.is_empty() {
            return Err(ProviderError::NoStreams);
        }

        match select_best(&streams, max_quality) {
            Some(best) => Ok(best.clone()),
            None => {
                debug!(imdb_id, max_quality, "no cached stream within cap, using first result");
                Ok(streams[0].clone())
            }
        }
    }

    /// Whether any provider reports a cached stream for the content
    pub async fn has_cached_stream(
        &self,
        imdb_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> bool {
        match self.streams(imdb_id, season, episode).await {
            Ok(streams) => streams.iter().any(|s| s.cached),
            Err(err) => {
                debug!(imdb_id, error = %err, "cache availability check failed");
                false
            }
        }
    }

    /// Direct play URL for a stream
    ///
    /// Hash-only streams need a debrid resolution step this crate does not
    /// perform.
    pub fn resolve_play_url(&self, stream: &NormalizedStream) -> Result<String, ProviderError> {
        if stream.url.is_empty() {
            return Err(ProviderError::NotImplemented("debrid resolution"));
        }
        Ok(stream.url.clone())
    }

    /// Concatenate per-provider results in registration order
    fn merge(
        &self,
        results: Vec<Result<Vec<NormalizedStream>, ProviderError>>,
    ) -> Result<Vec<NormalizedStream>, ProviderError> {
        let mut merged = Vec::new();
        let mut last_error = None;

        for ((name, _), result) in self.providers.iter().zip(results) {
            match result {
                Ok(mut streams) => {
                    streams.retain(NormalizedStream::is_playable);
                    debug!(provider = %name, count = streams.len(), "provider answered");
                    merged.append(&mut streams);
                }
                Err(ProviderError::NoResults(_)) => {
                    debug!(provider = %name, "provider has no results");
                }
                Err(err) => {
                    warn!(provider = %name, error = %err, "provider failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if merged.is_empty() => Err(err),
            _ => Ok(merged),
        }
    }
}

/// Highest cached quality within the cap; more seeders breaks ties, then
/// the earliest stream wins
pub fn select_best(streams: &[NormalizedStream], max_quality: u32) -> Option<&NormalizedStream> {
    let mut best: Option<&NormalizedStream> = None;
    for stream in streams
        .iter()
        .filter(|s| s.cached && s.quality.value() <= max_quality)
    {
        let better = match best {
            None => true,
            Some(current) => {
                let (q, cq) = (stream.quality.value(), current.quality.value());
                q > cq || (q == cq && stream.seeders > current.seeders)
            }
        };
        if better {
            best = Some(stream);
        }
    }
    best
}

fn build_provider(
    name: &str,
    config: &Config,
    debrid: &DebridSettings,
    resolver: Option<&Arc<dyn IdResolver>>,
) -> Option<Arc<dyn StreamProvider>> {
    let url_or = |custom: &Option<String>, default: &str| {
        custom.clone().unwrap_or_else(|| default.to_string())
    };

    let provider: Arc<dyn StreamProvider> = match name.to_lowercase().as_str() {
        "torrentio" => Arc::new(AddonProvider::new(
            name,
            AddonKind::Torrentio,
            url_or(&config.torrentio_url, crate::api::addon::TORRENTIO_URL),
            debrid,
        )),
        "comet" => Arc::new(AddonProvider::new(
            name,
            AddonKind::Comet,
            url_or(&config.comet_url, crate::api::addon::COMET_URL),
            debrid,
        )),
        "mediafusion" => Arc::new(AddonProvider::new(
            name,
            AddonKind::MediaFusion,
            url_or(&config.mediafusion_url, crate::api::addon::MEDIAFUSION_URL),
            debrid,
        )),
        "zilean" => Arc::new(ZileanProvider::with_base_url(url_or(
            &config.zilean_url,
            crate::api::zilean::ZILEAN_URL,
        ))),
        "autoembed" => {
            let resolver = resolver?;
            Arc::new(
                AutoEmbedProvider::with_base_url(
                    url_or(&config.autoembed_url, crate::api::autoembed::AUTOEMBED_URL),
                    Arc::clone(resolver),
                )
                .with_language(&config.language),
            )
        }
        "vidsrc" => {
            let resolver = resolver?;
            Arc::new(VidSrcProvider::with_base_url(
                url_or(&config.vidsrc_url, crate::api::vidsrc::VIDSRC_URL),
                Arc::clone(resolver),
            ))
        }
        _ => {
            let addon = config
                .addons
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(name))?;
            Arc::new(AddonProvider::from_addon(
                addon.name.clone(),
                addon.url.clone(),
                addon.kind,
                debrid,
            ))
        }
    };
    Some(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quality;

    fn stream(hash: &str, quality: Quality, seeders: u32, cached: bool) -> NormalizedStream {
        NormalizedStream {
            name: format!("test {}", quality),
            title: hash.to_string(),
            info_hash: hash.to_string(),
            file_idx: None,
            url: String::new(),
            quality,
            size_bytes: 0,
            seeders,
            cached,
            source: "test".to_string(),
            format: None,
        }
    }

    #[test]
    fn test_select_best_respects_cap() {
        let streams = vec![
            stream("uhd", Quality::UHD4K, 500, true),
            stream("fhd", Quality::FHD1080p, 10, true),
            stream("hd", Quality::HD720p, 900, true),
        ];
        assert_eq!(select_best(&streams, 1080).unwrap().info_hash, "fhd");
        assert_eq!(select_best(&streams, 2160).unwrap().info_hash, "uhd");
        assert_eq!(select_best(&streams, 720).unwrap().info_hash, "hd");
    }

    #[test]
    fn test_select_best_seeders_break_ties() {
        let streams = vec![
            stream("ten", Quality::FHD1080p, 10, true),
            stream("fifty", Quality::FHD1080p, 50, true),
        ];
        assert_eq!(select_best(&streams, 1080).unwrap().info_hash, "fifty");
    }

    #[test]
    fn test_select_best_first_wins_full_tie() {
        let streams = vec![
            stream("first", Quality::FHD1080p, 50, true),
            stream("second", Quality::FHD1080p, 50, true),
        ];
        assert_eq!(select_best(&streams, 1080).unwrap().info_hash, "first");
    }

    #[test]
    fn test_select_best_ignores_uncached() {
        let streams = vec![
            stream("uncached", Quality::FHD1080p, 999, false),
            stream("cached", Quality::HD720p, 1, true),
        ];
        assert_eq!(select_best(&streams, 1080).unwrap().info_hash, "cached");
    }

    #[test]
    fn test_select_best_unknown_counts_as_zero() {
        let streams = vec![stream("tag", Quality::Remux, 5, true)];
        assert_eq!(select_best(&streams, 480).unwrap().info_hash, "tag");
        assert!(select_best(&[stream("x", Quality::SD480p, 1, false)], 1080).is_none());
    }

    #[test]
    fn test_resolve_play_url() {
        let aggregator = Aggregator::new(Vec::new());
        let mut s = stream("abc", Quality::FHD1080p, 0, true);
        assert!(matches!(
            aggregator.resolve_play_url(&s),
            Err(ProviderError::NotImplemented(_))
        ));
        s.url = "https://cdn.example/v.mp4".to_string();
        assert_eq!(aggregator.resolve_play_url(&s).unwrap(), "https://cdn.example/v.mp4");
    }

    #[test]
    fn test_registry_skips_unknown_and_keeps_order() {
        let config = Config {
            providers: vec![
                "zilean".to_string(),
                "nonsense".to_string(),
                "comet".to_string(),
            ],
            ..Config::default()
        };
        let aggregator = Aggregator::from_config(&config);
        assert_eq!(aggregator.provider_names(), vec!["zilean", "comet"]);
    }

    #[test]
    fn test_registry_falls_back_to_default() {
        let config = Config {
            providers: vec!["nonsense".to_string()],
            ..Config::default()
        };
        let aggregator = Aggregator::from_config(&config);
        assert_eq!(aggregator.provider_names(), vec![DEFAULT_PROVIDER]);
    }

    #[test]
    fn test_scrapers_need_a_resolver() {
        let config = Config {
            providers: vec!["vidsrc".to_string(), "autoembed".to_string()],
            tmdb_api_key: None,
            ..Config::default()
        };
        assert_eq!(Aggregator::from_config(&config).provider_names(), vec![DEFAULT_PROVIDER]);

        let config = Config {
            tmdb_api_key: Some("key".to_string()),
            ..config
        };
        assert_eq!(
            Aggregator::from_config(&config).provider_names(),
            vec!["vidsrc", "autoembed"]
        );
    }

    #[test]
    fn test_registry_resolves_custom_addons() {
        let config = Config {
            providers: vec!["peerflix".to_string()],
            addons: vec![crate::config::AddonConfig {
                name: "peerflix".to_string(),
                url: "https://peerflix.example".to_string(),
                kind: None,
            }],
            ..Config::default()
        };
        assert_eq!(Aggregator::from_config(&config).provider_names(), vec!["peerflix"]);
    }

    #[test]
    fn test_empty_registry_yields_empty_merge() {
        let aggregator = Aggregator::new(Vec::new());
        let streams = tokio_test::block_on(aggregator.movie_streams("tt1")).unwrap();
        assert!(streams.is_empty());
    }
}
