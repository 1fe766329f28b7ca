//! Data structures shared by every provider and the aggregator
//!
//! - **Content**: media type discriminator and content keys
//! - **Quality**: coarse resolution buckets plus the textual release tags
//!   the hash database reports when no resolution is known
//! - **Streams**: the normalized stream every upstream response is converted into

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Content Models
// =============================================================================

/// Media type discriminator, spelled the way the addon protocol spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    /// Path segment used by `/stream/{type}/{id}.json`
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Episode coordinates, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeRef {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Normalized quality bucket
///
/// Only the four resolution buckets carry a numeric value; release tags
/// (`REMUX`, `WEB-DL`, `BluRay`) and `Unknown` compare as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "2160")]
    UHD4K,
    #[serde(rename = "1080")]
    FHD1080p,
    #[serde(rename = "720")]
    HD720p,
    #[serde(rename = "480")]
    SD480p,
    #[serde(rename = "REMUX")]
    Remux,
    #[serde(rename = "WEB-DL")]
    WebDl,
    #[serde(rename = "BluRay")]
    BluRay,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Quality {
    /// Numeric value used for `max_quality` comparisons
    pub fn value(&self) -> u32 {
        match self {
            Quality::UHD4K => 2160,
            Quality::FHD1080p => 1080,
            Quality::HD720p => 720,
            Quality::SD480p => 480,
            Quality::Remux | Quality::WebDl | Quality::BluRay | Quality::Unknown => 0,
        }
    }

    /// Bucket for a numeric resolution, `Unknown` for anything else
    pub fn from_value(value: u32) -> Self {
        match value {
            2160 => Quality::UHD4K,
            1080 => Quality::FHD1080p,
            720 => Quality::HD720p,
            480 => Quality::SD480p,
            _ => Quality::Unknown,
        }
    }

    /// Whether this bucket carries a real resolution
    pub fn is_resolution(&self) -> bool {
        self.value() > 0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::UHD4K => write!(f, "2160"),
            Quality::FHD1080p => write!(f, "1080"),
            Quality::HD720p => write!(f, "720"),
            Quality::SD480p => write!(f, "480"),
            Quality::Remux => write!(f, "REMUX"),
            Quality::WebDl => write!(f, "WEB-DL"),
            Quality::BluRay => write!(f, "BluRay"),
            Quality::Unknown => write!(f, "Unknown"),
        }
    }
}

// =============================================================================
// Stream Models
// =============================================================================

/// Container of a direct-play URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    Mp4,
    M3u8,
}

impl StreamFormat {
    /// Classify a URL by its file extension, ignoring any query string
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".m3u8") {
            Some(StreamFormat::M3u8)
        } else if path.ends_with(".mp4") {
            Some(StreamFormat::Mp4)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StreamFormat::Mp4 => "mp4",
            StreamFormat::M3u8 => "m3u8",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One candidate playable source, whatever provider it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStream {
    /// Provider label, often carrying quality and cache markers
    pub name: String,
    pub title: String,
    pub info_hash: String,
    pub file_idx: Option<u32>,
    pub url: String,
    pub quality: Quality,
    /// 0 when unknown
    pub size_bytes: i64,
    /// 0 when unknown
    pub seeders: u32,
    /// Available at the debrid service without a download wait
    pub cached: bool,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<StreamFormat>,
}

impl NormalizedStream {
    /// A stream needs a direct URL or a torrent hash to be of any use
    pub fn is_playable(&self) -> bool {
        !self.url.is_empty() || !self.info_hash.is_empty()
    }

    /// Generate magnet URL for a hash-only stream
    pub fn to_magnet(&self, display_name: &str) -> String {
        format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            self.info_hash,
            urlencoding::encode(display_name)
        )
    }

    /// Format size for display
    pub fn format_size(&self) -> String {
        let bytes = self.size_bytes;
        if bytes >= 1024 * 1024 * 1024 {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        } else if bytes >= 1024 * 1024 {
            format!("{:.0} MB", bytes as f64 / (1024.0 * 1024.0))
        } else if bytes > 0 {
            format!("{} KB", bytes / 1024)
        } else {
            "? GB".to_string()
        }
    }
}

impl fmt::Display for NormalizedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.cached { "+" } else { " " };
        write!(
            f,
            "[{}]{} {} 👤{} {} ({})",
            self.quality,
            marker,
            self.format_size(),
            self.seeders,
            self.title.lines().next().unwrap_or(&self.title),
            self.source
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(url: &str, hash: &str) -> NormalizedStream {
        NormalizedStream {
            name: "Torrentio\n1080p".to_string(),
            title: "The.Batman.2022.1080p".to_string(),
            info_hash: hash.to_string(),
            file_idx: None,
            url: url.to_string(),
            quality: Quality::FHD1080p,
            size_bytes: 0,
            seeders: 0,
            cached: false,
            source: "torrentio".to_string(),
            format: None,
        }
    }

    #[test]
    fn test_media_type_path_segment() {
        assert_eq!(MediaType::Movie.as_str(), "movie");
        assert_eq!(MediaType::Series.to_string(), "series");
    }

    #[test]
    fn test_quality_values() {
        assert_eq!(Quality::UHD4K.value(), 2160);
        assert_eq!(Quality::SD480p.value(), 480);
        assert_eq!(Quality::Remux.value(), 0);
        assert_eq!(Quality::Unknown.value(), 0);
        assert_eq!(Quality::from_value(720), Quality::HD720p);
        assert_eq!(Quality::from_value(1440), Quality::Unknown);
    }

    #[test]
    fn test_quality_serializes_as_bucket_text() {
        assert_eq!(serde_json::to_string(&Quality::UHD4K).unwrap(), "\"2160\"");
        assert_eq!(serde_json::to_string(&Quality::WebDl).unwrap(), "\"WEB-DL\"");
        let q: Quality = serde_json::from_str("\"1080\"").unwrap();
        assert_eq!(q, Quality::FHD1080p);
    }

    #[test]
    fn test_stream_format_from_url() {
        assert_eq!(
            StreamFormat::from_url("https://cdn.example/master.m3u8?token=1"),
            Some(StreamFormat::M3u8)
        );
        assert_eq!(
            StreamFormat::from_url("https://cdn.example/Movie.MP4"),
            Some(StreamFormat::Mp4)
        );
        assert_eq!(StreamFormat::from_url("https://cdn.example/embed"), None);
    }

    #[test]
    fn test_playable_requires_url_or_hash() {
        assert!(stream("https://x/y.mp4", "").is_playable());
        assert!(stream("", "abc123").is_playable());
        assert!(!stream("", "").is_playable());
    }

    #[test]
    fn test_magnet_generation() {
        let s = stream("", "abc123def456789");
        assert_eq!(
            s.to_magnet("Tom & Jerry"),
            "magnet:?xt=urn:btih:abc123def456789&dn=Tom%20%26%20Jerry"
        );
    }

    #[test]
    fn test_format_size() {
        let mut s = stream("", "abc");
        assert_eq!(s.format_size(), "? GB");
        s.size_bytes = 1_610_612_736;
        assert_eq!(s.format_size(), "1.5 GB");
        s.size_bytes = 933_232_640;
        assert_eq!(s.format_size(), "890 MB");
    }
}
