use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CatalogError;
use crate::providers::Provider;
use crate::stream::{MatchRank, ResolvedSource, SourceKind};

// ── Catalog entries ───────────────────────────────────────────────────────────

/// Provider-agnostic catalog entry. `id` is namespaced: `"dramabox:41000102"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub poster: String,
    pub rating: String,
    pub genre: String,
    pub description: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl ContentItem {
    /// An item carrying nothing but its id.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: "Untitled".to_string(),
            poster: String::new(),
            rating: "New".to_string(),
            genre: String::new(),
            description: String::new(),
            episodes: Vec::new(),
        }
    }

    pub fn content_id(&self) -> Result<ContentId, CatalogError> {
        self.id.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    #[serde(rename = "lang")]
    pub language: String,
    pub url: String,
}

/// One playable unit of a [`ContentItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    /// 1-based display order.
    pub index: u32,
    pub title: String,
    #[serde(rename = "playerUrl")]
    pub player_url: Option<String>,
    #[serde(rename = "sourceKind", skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<SourceKind>,
    /// Raw per-provider quality/delivery metadata, kept for the resolver.
    #[serde(default)]
    pub qualities: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleTrack>,
    #[serde(skip)]
    pub rank: Option<MatchRank>,
}

impl Episode {
    pub fn new(id: impl Into<String>, index: u32, title: impl Into<String>, qualities: Value) -> Self {
        Self {
            id: id.into(),
            index,
            title: title.into(),
            player_url: None,
            source_kind: None,
            qualities,
            subtitles: Vec::new(),
            rank: None,
        }
    }

    /// Attach a resolved source. An existing URL is only replaced by a strictly
    /// higher-priority match; returns whether the episode changed.
    pub fn attach_source(&mut self, source: &ResolvedSource) -> bool {
        let replace = match (&self.player_url, self.rank) {
            (None, _) => true,
            (Some(_), Some(current)) => source.rank < current,
            (Some(_), None) => false,
        };
        if replace {
            self.player_url = Some(source.url.clone());
            self.source_kind = Some(source.kind);
            self.rank = Some(source.rank);
        }
        replace
    }
}

// ── Namespaced ids ────────────────────────────────────────────────────────────

/// Parsed `provider:raw` identifier. The raw part may itself contain `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    pub provider: Provider,
    pub raw: String,
}

impl ContentId {
    pub fn new(provider: Provider, raw: impl Into<String>) -> Self {
        Self {
            provider,
            raw: raw.into(),
        }
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider.tag(), self.raw)
    }
}

impl FromStr for ContentId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, raw) = s
            .split_once(':')
            .ok_or_else(|| CatalogError::InvalidId(s.to_string()))?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CatalogError::InvalidId(s.to_string()));
        }
        Ok(Self {
            provider: tag.parse()?,
            raw: raw.to_string(),
        })
    }
}
