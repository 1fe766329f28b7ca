//! Text heuristics shared by the providers
//!
//! Upstream labels are free text, so everything here is best effort and
//! order sensitive. All functions are pure.

use crate::models::{EpisodeRef, Quality};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Resolution patterns in scan order; the first one present wins
const QUALITY_PATTERNS: &[(&str, Quality)] = &[
    ("2160P", Quality::UHD4K),
    ("4K", Quality::UHD4K),
    ("1080P", Quality::FHD1080p),
    ("720P", Quality::HD720p),
    ("480P", Quality::SD480p),
];

/// Byte sequences that mark a stream as already cached at the debrid service.
///
/// The last entry is the UTF-8 encoding of "⚡" decoded as Windows-1252 and
/// re-encoded, which some addons emit verbatim.
const CACHED_MARKERS: &[&[u8]] = &[
    b"[RD+]",
    "[RD⚡]".as_bytes(),
    "⚡".as_bytes(),
    b"[RD download]",
    b"\xC3\xA2\xC5\xA1\xC2\xA1 cached",
];

const INSTANT_AVAILABLE: &str = "instant available";

/// Extract the resolution bucket from a label
///
/// Matching ignores case. `4K` normalizes to the 2160 bucket.
pub fn extract_quality(text: &str) -> Quality {
    let upper = text.to_uppercase();
    QUALITY_PATTERNS
        .iter()
        .find(|(pattern, _)| upper.contains(pattern))
        .map(|(_, quality)| *quality)
        .unwrap_or(Quality::Unknown)
}

/// Quality of a release filename: resolution tag first, then release type
pub fn filename_quality(filename: &str) -> Quality {
    let quality = extract_quality(filename);
    if quality.is_resolution() {
        return quality;
    }

    let upper = filename.to_uppercase();
    if upper.contains("REMUX") {
        Quality::Remux
    } else if upper.contains("WEB-DL") {
        Quality::WebDl
    } else if upper.contains("BLURAY") {
        Quality::BluRay
    } else {
        Quality::Unknown
    }
}

/// Parse a size like `1.5GB` or `890 MB` out of free text, in bytes
///
/// `GB` is searched before `MB`; only the first occurrence of the unit is
/// considered. Walking back from the unit collects digits and at most one
/// decimal point. Returns 0 when nothing parses.
pub fn parse_size_from_text(text: &str) -> i64 {
    for (unit, multiplier) in [("GB", GIB), ("MB", MIB)] {
        if let Some(pos) = text.find(unit) {
            return number_before(&text[..pos])
                .map(|n| (n * multiplier).round() as i64)
                .unwrap_or(0);
        }
    }
    0
}

fn number_before(prefix: &str) -> Option<f64> {
    let trimmed = prefix.trim_end_matches(' ');
    let bytes = trimmed.as_bytes();
    let mut start = bytes.len();
    let mut seen_dot = false;

    while start > 0 {
        match bytes[start - 1] {
            b'0'..=b'9' => start -= 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                start -= 1;
            }
            _ => break,
        }
    }

    trimmed[start..].parse().ok()
}

/// Whether a label carries any known "cached at the debrid service" marker
pub fn is_cached_marker(text: &str) -> bool {
    let haystack = text.as_bytes();
    if CACHED_MARKERS
        .iter()
        .any(|marker| contains_bytes(haystack, marker))
    {
        return true;
    }
    text.to_lowercase().contains(INSTANT_AVAILABLE)
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Parse seeders from a title (e.g., "👤 142" or "👤 1.2k")
pub fn parse_seeds(title: &str) -> u32 {
    // Emoji format first: 👤 123 or 👤 1.2k
    let re = regex::Regex::new(r"👤\s*(\d+(?:\.\d+)?)\s*(k)?").ok();
    if let Some(re) = re {
        if let Some(caps) = re.captures(title) {
            let num: f32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            let multiplier = if caps.get(2).is_some() { 1000.0 } else { 1.0 };
            return (num * multiplier) as u32;
        }
    }

    // "seeds: N" format
    let re_seeds = regex::Regex::new(r"seeds?:\s*(\d+)").ok();
    if let Some(re) = re_seeds {
        if let Some(caps) = re.captures(&title.to_lowercase()) {
            return caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
        }
    }

    0
}

/// Filename patterns identifying one episode: `S01E02`, `s01e02`, `1x02`, `01x02`
pub fn episode_patterns(ep: EpisodeRef) -> Vec<String> {
    vec![
        format!("S{:02}E{:02}", ep.season, ep.episode),
        format!("s{:02}e{:02}", ep.season, ep.episode),
        format!("{}x{:02}", ep.season, ep.episode),
        format!("{:02}x{:02}", ep.season, ep.episode),
    ]
}

/// Whether a release filename belongs to the given episode
///
/// A pattern only counts when no digit touches it on either side, so season 1
/// never matches `11x01` and episode 1 never matches `S01E011`.
pub fn matches_episode(filename: &str, ep: EpisodeRef) -> bool {
    let alternatives: Vec<String> = episode_patterns(ep)
        .iter()
        .map(|pattern| regex::escape(pattern))
        .collect();
    let pattern = format!(r"(?:^|[^0-9])(?:{})(?:[^0-9]|$)", alternatives.join("|"));
    regex::Regex::new(&pattern)
        .map(|re| re.is_match(filename))
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
