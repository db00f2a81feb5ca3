//! Anime catalog. Detail pages list episode slugs; each slug resolves through a second
//! `watch` call into embeddable servers.

use serde_json::Value;

use super::fields::{first_text, ordinal, pick, position_index, text};
use super::{namespaced, Provider};
use crate::model::{ContentItem, Episode};
use crate::stream::{DeliveryNode, QualityPath};

/// The detail endpoint rejects requests without this site header.
pub const SITE_HEADER: (&str, &str) = ("siteName", "COBANONTON");

pub const FLAT_FIELDS: [&str; 2] = ["embed", "url"];

pub fn normalize(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["slug"])?;

    Some(ContentItem {
        id: namespaced(Provider::Tensei, &id),
        title: pick(raw, &["title"], "Anime"),
        poster: pick(raw, &["img", "poster"], ""),
        rating: pick(raw, &["score", "rating"], "New"),
        genre: pick(raw, &["genres.0", "genres.0.name", "type"], "Anime"),
        description: pick(raw, &["synopsis", "description"], ""),
        episodes: vec![],
    })
}

pub fn detail_record(payload: &Value) -> &Value {
    &payload["data"]
}

/// Episodes carry only their watch slug until resolved.
pub fn episodes(payload: &Value) -> Vec<Episode> {
    let Some(raw_episodes) = payload["data"]["episodes"].as_array() else {
        return vec![];
    };

    raw_episodes
        .iter()
        .enumerate()
        .filter_map(|(position, ep)| {
            let slug = text(ep, "slug")?;
            let index = ordinal(ep, "ep", 0)
                .or_else(|| ordinal(ep, "episode", 0))
                .unwrap_or_else(|| position_index(position));
            Some(Episode::new(slug, index, format!("Episode {index}"), ep.clone()))
        })
        .collect()
}

/// Servers from a `watch` payload, one node each; the first listed server is the default.
pub fn delivery(watch_payload: &Value) -> Vec<DeliveryNode> {
    let Some(servers) = watch_payload["data"]["servers"].as_array() else {
        return vec![];
    };

    servers
        .iter()
        .filter_map(|server| {
            let url = text(server, "embed")?;
            Some(QualityPath {
                label: text(server, "name"),
                url,
                is_default: true,
            })
        })
        .enumerate()
        .map(|(position, path)| DeliveryNode {
            name: path.label.clone(),
            is_default: position == 0,
            paths: vec![path],
        })
        .collect()
}
