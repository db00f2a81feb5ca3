use serde::{Deserialize, Serialize};

use crate::model::ContentItem;
use crate::stream::ResolvedSource;

// ── Server info ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub ip: String,
    pub port: u16,
    pub url: String,
    pub providers: Vec<String>,
}

// ── Query params ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// 1-based page, defaulting to 1 for missing or unparsable input.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScrollQuery {
    pub distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SubtitleQuery {
    pub lang: Option<String>,
}

// ── Bodies ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FeedRequest {
    /// Provider tag; omitted for the merged all-provider feed.
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub id: String,
    pub page: u32,
    /// Items merged by this call; `None` when the trigger was ignored.
    pub added: Option<usize>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    pub items: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackRequest {
    pub id: String,
    pub index: u32,
}

#[derive(Debug, Serialize)]
pub struct PlaybackState {
    pub session: String,
    pub source: Option<ResolvedSource>,
    /// A newer switch finished first; this request's result was discarded.
    pub superseded: bool,
}
