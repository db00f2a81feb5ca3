//! Playable-source selection for a single episode.
//!
//! Providers describe an episode as a list of delivery nodes (CDNs, servers, quality groups),
//! each carrying quality-tagged paths. [`resolve_nodes`] picks exactly one URL from that
//! structure and [`classify`] decides how the playback surface should host it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, Result};
use crate::model::SubtitleTrack;

/// Flat fields checked on a raw episode when no delivery node yields a path.
pub const FLAT_SOURCE_FIELDS: [&str; 3] = ["videoUrl", "url", "videoPath"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPath {
    pub label: Option<String>,
    pub url: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryNode {
    pub name: Option<String>,
    pub is_default: bool,
    pub paths: Vec<QualityPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    DirectMedia,
    EmbeddableDocument,
}

/// Which selection rule produced a URL. Earlier variants are higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    DefaultNodeDefaultPath,
    DefaultNodeFirstPath,
    FirstListedPath,
    FlatField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub url: String,
    pub kind: SourceKind,
    #[serde(skip)]
    pub rank: MatchRank,
    /// Tracks the episode offers; the only ones a playback session will load.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleTrack>,
}

impl ResolvedSource {
    fn new(url: &str, rank: MatchRank) -> Self {
        Self {
            url: url.to_string(),
            kind: classify(url),
            rank,
            subtitles: Vec::new(),
        }
    }

    pub fn with_subtitles(mut self, subtitles: Vec<SubtitleTrack>) -> Self {
        self.subtitles = subtitles;
        self
    }

    pub fn subtitle(&self, language: &str) -> Option<&SubtitleTrack> {
        self.subtitles
            .iter()
            .find(|t| t.language.eq_ignore_ascii_case(language))
    }

    /// The same selection, pointed at a URL obtained from a stream handoff.
    pub fn redirect(self, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            kind: classify(&url),
            url,
            ..self
        }
    }
}

// ── Selection ────────────────────────────────────────────────────────────────

/// Resolve a raw episode in the common `cdnList[].videoPathList[]` shape.
pub fn resolve(raw_episode: &Value) -> Result<ResolvedSource> {
    let flat = flat_source(raw_episode, &FLAT_SOURCE_FIELDS);
    resolve_nodes(&cdn_nodes(raw_episode), flat.as_deref())
}

/// Pick one URL, in strict priority order:
/// 1. a default node's default path,
/// 2. the default node's first path,
/// 3. the first path of any node, in listed order,
/// 4. the flat fallback.
pub fn resolve_nodes(nodes: &[DeliveryNode], flat: Option<&str>) -> Result<ResolvedSource> {
    let default_node = nodes.iter().find(|n| n.is_default);

    if let Some(path) = nodes
        .iter()
        .filter(|n| n.is_default)
        .find_map(|n| n.paths.iter().find(|p| p.is_default && !p.url.is_empty()))
    {
        return Ok(ResolvedSource::new(&path.url, MatchRank::DefaultNodeDefaultPath));
    }

    if let Some(path) = default_node.and_then(|n| n.paths.iter().find(|p| !p.url.is_empty())) {
        return Ok(ResolvedSource::new(&path.url, MatchRank::DefaultNodeFirstPath));
    }

    if let Some(path) = nodes
        .iter()
        .flat_map(|n| n.paths.iter())
        .find(|p| !p.url.is_empty())
    {
        return Ok(ResolvedSource::new(&path.url, MatchRank::FirstListedPath));
    }

    match flat.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Ok(ResolvedSource::new(url, MatchRank::FlatField)),
        None => Err(CatalogError::NoPlayableSource),
    }
}

/// Parse `cdnList[]` / `videoPathList[]` delivery nodes. Missing or malformed entries are skipped.
pub fn cdn_nodes(raw_episode: &Value) -> Vec<DeliveryNode> {
    let Some(cdns) = raw_episode["cdnList"].as_array() else {
        return vec![];
    };

    cdns.iter()
        .map(|cdn| DeliveryNode {
            name: cdn["cdnDomain"].as_str().map(str::to_string),
            is_default: is_flagged(&cdn["isDefault"]),
            paths: cdn["videoPathList"]
                .as_array()
                .map(|paths| {
                    paths
                        .iter()
                        .filter_map(|p| {
                            let url = p["videoPath"].as_str()?.trim();
                            Some(QualityPath {
                                label: quality_label(&p["quality"]),
                                url: url.to_string(),
                                is_default: is_flagged(&p["isDefault"]),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// First non-empty string among `fields`, in order.
pub fn flat_source(raw_episode: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| {
        raw_episode[*f]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Upstreams flag defaults as `1`, `true`, or `"1"`.
pub fn is_flagged(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn quality_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(format!("{n}p")),
        _ => None,
    }
}

// ── Classification ───────────────────────────────────────────────────────────

/// Substrings that mark a player page rather than a media file.
pub const PAGE_MARKERS: [&str; 2] = ["player.php", "/player/"];

static DIRECT_MEDIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mp4|m3u8)(\?.*)?$").expect("direct media pattern is valid")
});

/// Decide whether `url` is a media resource or a page to embed.
///
/// | Rule | Result |
/// |---|---|
/// | contains a [`PAGE_MARKERS`] entry or an `embed` path segment | embeddable document |
/// | path ends in `.html` / `.htm` | embeddable document |
/// | ends in `.mp4` or `.m3u8`, optionally followed by a query | direct media |
/// | anything else | embeddable document |
///
/// This is best effort: no content type is known until the resource is actually requested.
pub fn classify(url: &str) -> SourceKind {
    let lowered = url.to_ascii_lowercase();
    let path = lowered.split(['?', '#']).next().unwrap_or("");

    let is_page = PAGE_MARKERS.iter().any(|m| lowered.contains(m))
        || path_segments(path).any(|segment| segment == "embed")
        || path.ends_with(".html")
        || path.ends_with(".htm");

    if is_page || !DIRECT_MEDIA.is_match(url) {
        SourceKind::EmbeddableDocument
    } else {
        SourceKind::DirectMedia
    }
}

/// Segments of a URL path, skipping the scheme and host when present.
fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, p)| p),
        None => path,
    };
    path.split('/').filter(|s| !s.is_empty())
}
