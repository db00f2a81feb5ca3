//! The short-drama family served from the shared aggregator API: DramaBox, NetShort,
//! ReelShort and FlickReels. They share the `cdnList` episode shape.

use serde_json::Value;

use super::fields::{first_text, number, ordinal, pick, position_index, text};
use super::{namespaced, Provider};
use crate::envelope::unwrap_list;
use crate::model::{ContentItem, Episode};

pub fn normalize_dramabox(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["bookId", "id"])?;

    Some(ContentItem {
        id: namespaced(Provider::DramaBox, &id),
        title: pick(raw, &["bookName", "name", "title"], "Untitled"),
        poster: pick(raw, &["coverWap", "cover", "poster", "imageUrl"], ""),
        rating: pick(raw, &["rankVo.hotCode"], "New"),
        genre: pick(raw, &["tags.0", "tagNames.0"], "Drama"),
        description: pick(raw, &["introduction", "desc"], ""),
        episodes: vec![],
    })
}

pub fn normalize_netshort(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["shortPlayId", "id"])?;

    Some(ContentItem {
        id: namespaced(Provider::NetShort, &id),
        title: pick(raw, &["title", "shortPlayName"], "Untitled"),
        poster: pick(raw, &["coverUrl", "shortPlayCover", "cover"], ""),
        rating: pick(raw, &["heatScoreShow"], "New"),
        genre: pick(raw, &["labelArray.0"], "Short TV"),
        description: pick(raw, &["shotIntroduce", "introduce"], ""),
        episodes: vec![],
    })
}

pub fn normalize_reelshort(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["book_id", "id"])?;

    let rating = number(raw, "collect_count")
        .filter(|count| *count > 0.0)
        .map(|count| format!("{:.1}K", count / 1000.0))
        .unwrap_or_else(|| "New".to_string());

    Some(ContentItem {
        id: namespaced(Provider::ReelShort, &id),
        title: pick(raw, &["book_title", "title"], "Untitled"),
        poster: pick(raw, &["book_pic", "cover"], ""),
        rating,
        genre: pick(raw, &["theme.0"], "Short TV"),
        description: pick(raw, &["special_desc", "description"], ""),
        episodes: vec![],
    })
}

pub fn normalize_flickreels(raw: &Value) -> Option<ContentItem> {
    raw.as_object()?;
    let id = first_text(raw, &["book_id", "playlet_id"])?;

    Some(ContentItem {
        id: namespaced(Provider::FlickReels, &id),
        title: pick(raw, &["book_title", "title"], "Untitled"),
        poster: pick(raw, &["book_pic", "cover"], ""),
        rating: pick(raw, &["score"], "New"),
        genre: "Short TV".to_string(),
        description: pick(raw, &["introduce", "description"], ""),
        episodes: vec![],
    })
}

/// Detail payloads arrive either bare or wrapped in `data`.
pub fn detail_record(payload: &Value) -> &Value {
    match payload.get("data") {
        Some(data) if data.is_object() => data,
        _ => payload,
    }
}

/// Map an `allepisode` payload. Chapters keep their whole raw record for the resolver.
pub fn chapters(payload: &Value) -> Vec<Episode> {
    unwrap_list(payload)
        .iter()
        .enumerate()
        .filter(|(_, chapter)| chapter.is_object())
        .map(|(position, chapter)| {
            let index = ordinal(chapter, "chapterIndex", 1).unwrap_or_else(|| position_index(position));
            let id = first_text(chapter, &["chapterId", "id"]).unwrap_or_else(|| index.to_string());
            let title = text(chapter, "chapterName")
                .or_else(|| text(chapter, "title"))
                .unwrap_or_else(|| format!("Episode {index}"));
            Episode::new(id, index, title, chapter.clone())
        })
        .collect()
}
