//! The "micro" short-drama catalog. Its payloads use obfuscated keys:
//! `dope` id, `ngrand` title, `pcoa` cover, `dfill` synopsis, `sheat` tags, `eext` episode count,
//! `echa` episode number, `pjoint` quality list with `Dpri` label and `Mknee` URL.

use serde_json::Value;

use super::fields::{first_text, ordinal, pick, position_index, text};
use super::{namespaced, Provider};
use crate::model::{ContentItem, Episode};
use crate::stream::{DeliveryNode, QualityPath};

pub const PAGE_SIZE: usize = 20;
const PREFERRED_QUALITY: &str = "540P";

pub fn normalize(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["dope"])?;

    Some(ContentItem {
        id: namespaced(Provider::Micro, &id),
        title: pick(raw, &["ngrand"], "Drama"),
        poster: pick(raw, &["pcoa"], ""),
        rating: "New".to_string(),
        genre: pick(raw, &["sheat.0"], "Drama"),
        description: pick(raw, &["dfill"], ""),
        episodes: vec![],
    })
}

pub fn detail_record(payload: &Value) -> &Value {
    &payload["dassi"]["bsex"]
}

pub fn episodes(payload: &Value) -> Vec<Episode> {
    let Some(raw_episodes) = payload["dassi"]["erev"].as_array() else {
        return vec![];
    };

    raw_episodes
        .iter()
        .enumerate()
        .filter(|(_, ep)| ep.is_object())
        .map(|(position, ep)| {
            let index = ordinal(ep, "echa", 0).unwrap_or_else(|| position_index(position));
            Episode::new(index.to_string(), index, format!("Episode {index}"), ep.clone())
        })
        .collect()
}

/// One node holding every `pjoint` quality; the 540P rendition is the default.
pub fn delivery(raw_episode: &Value) -> Vec<DeliveryNode> {
    let paths: Vec<QualityPath> = raw_episode["pjoint"]
        .as_array()
        .map(|qualities| {
            qualities
                .iter()
                .filter_map(|q| {
                    let url = text(q, "Mknee")?;
                    let label = text(q, "Dpri");
                    Some(QualityPath {
                        is_default: label.as_deref() == Some(PREFERRED_QUALITY),
                        label,
                        url,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if paths.is_empty() {
        return vec![];
    }
    vec![DeliveryNode {
        name: Some("pjoint".to_string()),
        is_default: true,
        paths,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::resolve_nodes;
    use serde_json::json;

    #[test]
    fn obfuscated_keys_map_to_canonical_fields() {
        let item = normalize(&json!({
            "dope": "88", "ngrand": "Hidden Heiress", "pcoa": "https://img/p.jpg",
            "dfill": "Synopsis", "sheat": ["Revenge"], "eext": 60
        }))
        .unwrap();
        assert_eq!(item.id, "micro:88");
        assert_eq!(item.genre, "Revenge");
        assert_eq!(item.rating, "New");
    }

    #[test]
    fn prefers_540p_then_first_quality() {
        let with_540 = json!({ "pjoint": [
            { "Dpri": "720P", "Mknee": "https://v/720.mp4" },
            { "Dpri": "540P", "Mknee": "https://v/540.mp4" }
        ]});
        let resolved = resolve_nodes(&delivery(&with_540), None).unwrap();
        assert_eq!(resolved.url, "https://v/540.mp4");

        let without = json!({ "pjoint": [
            { "Dpri": "1080P", "Mknee": "https://v/1080.mp4" },
            { "Dpri": "720P", "Mknee": "https://v/720.mp4" }
        ]});
        let resolved = resolve_nodes(&delivery(&without), None).unwrap();
        assert_eq!(resolved.url, "https://v/1080.mp4");
    }

    #[test]
    fn episodes_are_indexed_by_echa() {
        let payload = json!({ "dassi": { "bsex": { "dope": "1" }, "erev": [
            { "echa": 2, "pjoint": [] },
            { "echa": 1, "pjoint": [] }
        ]}});
        let indices: Vec<u32> = episodes(&payload).iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![2, 1]);
        assert_eq!(detail_record(&payload)["dope"], "1");
    }

    #[test]
    fn oversized_echa_uses_list_position() {
        let payload = json!({ "dassi": { "erev": [{ "echa": 1e15 }, { "echa": 0 }] } });
        let indices: Vec<u32> = episodes(&payload).iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
