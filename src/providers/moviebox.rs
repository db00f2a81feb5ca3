//! Movie catalog. A title is a single playable episode whose qualities come from the
//! `watch` payload; the chosen `directUrl` must be exchanged for a stream URL before playback.

use serde_json::Value;

use super::fields::{first_text, number, pick, text};
use super::{namespaced, Provider};
use crate::model::{ContentItem, Episode, SubtitleTrack};
use crate::stream::{DeliveryNode, QualityPath};

pub const FLAT_FIELDS: [&str; 2] = ["directUrl", "url"];

/// Caption language listed first when present.
pub const PREFERRED_CAPTION: &str = "in_id";

pub fn normalize(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["subjectId"])?;

    let genre = text(raw, "genre")
        .and_then(|g| g.split(',').map(str::trim).find(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| "Movie".to_string());

    Some(ContentItem {
        id: namespaced(Provider::MovieBox, &id),
        title: pick(raw, &["title"], "Film"),
        poster: pick(raw, &["cover.url", "cover"], ""),
        rating: pick(raw, &["imdbRatingValue"], "New"),
        genre,
        description: pick(raw, &["description", "intro"], ""),
        episodes: vec![],
    })
}

pub fn detail_record(payload: &Value) -> &Value {
    &payload["subject"]
}

pub fn has_more(payload: &Value) -> Option<bool> {
    payload["pager"]["hasMore"].as_bool()
}

/// The whole watch payload becomes one episode. `hasResource: false` means nothing to play.
pub fn episodes(watch_payload: &Value) -> Vec<Episode> {
    if !watch_payload.is_object() || watch_payload["hasResource"] == Value::Bool(false) {
        return vec![];
    }

    let mut episode = Episode::new("1", 1, "Full Movie", watch_payload.clone());
    episode.subtitles = captions(watch_payload);
    vec![episode]
}

fn captions(watch_payload: &Value) -> Vec<SubtitleTrack> {
    let mut tracks: Vec<SubtitleTrack> = watch_payload["captions"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|c| {
                    Some(SubtitleTrack {
                        language: text(c, "lan")?,
                        url: text(c, "url")?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    // stable: preferred language first, others keep upstream order
    tracks.sort_by_key(|t| t.language != PREFERRED_CAPTION);
    tracks
}

/// One node of `processedSources`; the highest numeric quality is the default path.
pub fn delivery(watch_payload: &Value) -> Vec<DeliveryNode> {
    let Some(sources) = watch_payload["processedSources"].as_array() else {
        return vec![];
    };

    let mut paths: Vec<(f64, QualityPath)> = sources
        .iter()
        .filter_map(|s| {
            let url = text(s, "directUrl")?;
            let quality = number(s, "quality").unwrap_or(0.0);
            Some((
                quality,
                QualityPath {
                    label: text(s, "quality").map(|q| format!("{q}p")),
                    url,
                    is_default: false,
                },
            ))
        })
        .collect();

    let best = paths
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.0.total_cmp(&b.0))
        .map(|(i, _)| i);
    if let Some(best) = best {
        paths[best].1.is_default = true;
    }

    if paths.is_empty() {
        return vec![];
    }
    vec![DeliveryNode {
        name: Some("processedSources".to_string()),
        is_default: true,
        paths: paths.into_iter().map(|(_, p)| p).collect(),
    }]
}

/// Extract the playable URL from a `/stream` handoff response.
pub fn stream_url(payload: &Value) -> Option<String> {
    text(payload, "stream")
}
