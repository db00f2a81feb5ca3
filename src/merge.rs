use std::collections::HashSet;

use crate::model::{ContentItem, Episode};

/// Concatenate `lists` in order, keeping only the first item seen for each id.
pub fn merge_unique<I>(lists: I) -> Vec<ContentItem>
where
    I: IntoIterator<Item = Vec<ContentItem>>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// Append a freshly fetched page onto an accumulated list, absorbing items that drifted across
/// page boundaries. Returns how many items were actually added.
pub fn merge_page(accumulated: &mut Vec<ContentItem>, page: Vec<ContentItem>) -> usize {
    let mut seen: HashSet<String> = accumulated.iter().map(|i| i.id.clone()).collect();
    let before = accumulated.len();
    accumulated.extend(page.into_iter().filter(|item| seen.insert(item.id.clone())));
    accumulated.len() - before
}

/// Attach an episode list to a detail item, ordered by index with duplicate indices dropped.
pub fn attach_episodes(item: &mut ContentItem, mut episodes: Vec<Episode>) {
    episodes.sort_by_key(|e| e.index);
    episodes.dedup_by_key(|e| e.index);
    item.episodes = episodes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn item(id: &str, title: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            title: title.to_string(),
            poster: String::new(),
            rating: "New".to_string(),
            genre: "Drama".to_string(),
            description: String::new(),
            episodes: vec![],
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let a = item("dramabox:1", "A");
        let b = item("dramabox:2", "B");
        let a_again = item("dramabox:1", "A (page 2)");

        let merged = merge_unique(vec![vec![a.clone(), b.clone()], vec![a_again]]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn merge_page_absorbs_drift() {
        let mut acc = vec![item("micro:1", "1"), item("micro:2", "2")];
        let added = merge_page(&mut acc, vec![item("micro:2", "2"), item("micro:3", "3")]);
        assert_eq!(added, 1);
        let ids: Vec<&str> = acc.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["micro:1", "micro:2", "micro:3"]);
    }

    #[test]
    fn same_raw_id_from_different_providers_is_kept() {
        let merged = merge_unique(vec![
            vec![item("dramabox:7", "x")],
            vec![item("netshort:7", "y")],
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn attached_episodes_are_strictly_increasing() {
        let mut detail = item("micro:9", "Nine");
        let episodes = vec![
            Episode::new("3", 3, "Episode 3", Value::Null),
            Episode::new("1", 1, "Episode 1", Value::Null),
            Episode::new("1b", 1, "Episode 1 again", Value::Null),
            Episode::new("2", 2, "Episode 2", Value::Null),
        ];
        attach_episodes(&mut detail, episodes);
        let indices: Vec<u32> = detail.episodes.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(detail.episodes[0].id, "1");
    }
}
