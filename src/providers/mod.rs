//! Provider adapters: endpoint layout, raw → canonical normalization, and the per-provider
//! delivery shapes fed to the stream resolver.

pub mod fields;
mod micro;
mod moviebox;
mod shortdrama;
mod tensei;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::envelope::unwrap_list;
use crate::error::{CatalogError, Result};
use crate::model::{ContentId, ContentItem, Episode};
use crate::stream::{cdn_nodes, flat_source, DeliveryNode, FLAT_SOURCE_FIELDS};
use crate::transport::FetchRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    DramaBox,
    NetShort,
    ReelShort,
    FlickReels,
    Micro,
    Tensei,
    MovieBox,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::DramaBox,
        Provider::NetShort,
        Provider::ReelShort,
        Provider::FlickReels,
        Provider::Micro,
        Provider::Tensei,
        Provider::MovieBox,
    ];

    /// Namespace prefix used in content ids.
    pub fn tag(self) -> &'static str {
        match self {
            Provider::DramaBox => "dramabox",
            Provider::NetShort => "netshort",
            Provider::ReelShort => "reelshort",
            Provider::FlickReels => "flickreels",
            Provider::Micro => "micro",
            Provider::Tensei => "tensei",
            Provider::MovieBox => "moviebox",
        }
    }

    /// The raw field a record's identity is read from first.
    fn id_field(self) -> &'static str {
        match self {
            Provider::DramaBox => "bookId",
            Provider::NetShort => "shortPlayId",
            Provider::ReelShort | Provider::FlickReels => "book_id",
            Provider::Micro => "dope",
            Provider::Tensei => "slug",
            Provider::MovieBox => "subjectId",
        }
    }

    fn base(self, endpoints: &Endpoints) -> &str {
        match self {
            Provider::DramaBox | Provider::NetShort | Provider::ReelShort | Provider::FlickReels => {
                &endpoints.shortdrama
            }
            Provider::Micro | Provider::Tensei | Provider::MovieBox => &endpoints.dramabos,
        }
    }

    /// Providers whose playable URL needs another round trip after detail.
    pub fn resolves_lazily(self) -> bool {
        matches!(self, Provider::Tensei | Provider::MovieBox)
    }

    fn unsupported(self, operation: &'static str) -> CatalogError {
        CatalogError::Unsupported {
            provider: self.tag(),
            operation,
        }
    }

    // ── Endpoints ────────────────────────────────────────────────────────────

    /// Requests making up one listing page. DramaBox merges its trending and for-you feeds with
    /// a standing "drama" search.
    pub fn listing_requests(self, endpoints: &Endpoints, page: u32) -> Vec<FetchRequest> {
        let base = self.base(endpoints);
        let page = page.max(1);
        let url = |path: String| FetchRequest::get(format!("{base}{path}")).labelled(format!("{self}:listing:{page}"));

        match self {
            Provider::DramaBox => vec![
                url(format!("/dramabox/trending?page={page}")),
                url(format!("/dramabox/foryou?page={page}")),
                url("/dramabox/search?query=drama".to_string()),
            ],
            Provider::NetShort => vec![url(format!("/netshort/foryou?page={page}"))],
            Provider::ReelShort => vec![url(format!("/reelshort/foryou?page={page}"))],
            Provider::FlickReels => vec![url(format!("/flickreels/foryou?page={page}"))],
            Provider::Micro => vec![url(format!(
                "/micro/api/v1/list?lang=id&page={page}&limit={}",
                micro::PAGE_SIZE
            ))],
            Provider::Tensei => vec![url(format!("/tensei/anime?page={page}&order=update"))],
            Provider::MovieBox => vec![url(format!("/moviebox/v1/popular?p={}", page - 1))],
        }
    }

    /// A named, unpaged feed. Only DramaBox publishes these.
    pub fn feed_request(self, endpoints: &Endpoints, feed: Feed) -> Result<FetchRequest> {
        match self {
            Provider::DramaBox => Ok(FetchRequest::get(format!(
                "{}/dramabox/{}",
                self.base(endpoints),
                feed.path()
            ))
            .labelled(format!("{self}:feed:{feed}"))),
            _ => Err(self.unsupported("feed")),
        }
    }

    pub fn search_request(self, endpoints: &Endpoints, query: &str) -> Result<FetchRequest> {
        let base = self.base(endpoints);
        let q = urlencoding::encode(query);
        let path = match self {
            Provider::DramaBox => format!("/dramabox/search?query={q}"),
            Provider::NetShort => format!("/netshort/search?query={q}"),
            Provider::Micro => format!("/micro/api/v1/search?q={q}&lang=id&limit={}", micro::PAGE_SIZE),
            Provider::Tensei => format!("/tensei/search?q={q}"),
            Provider::MovieBox => format!("/moviebox/v1/find?q={q}"),
            Provider::ReelShort | Provider::FlickReels => return Err(self.unsupported("search")),
        };
        Ok(FetchRequest::get(format!("{base}{path}")).labelled(format!("{self}:search:{query}")))
    }

    pub fn detail_plan(self, endpoints: &Endpoints, raw_id: &str) -> Result<DetailPlan> {
        let base = self.base(endpoints);
        let id = urlencoding::encode(raw_id);
        let request = |path: String, what: &str| {
            FetchRequest::get(format!("{base}{path}")).labelled(format!("{self}:{what}:{raw_id}"))
        };

        match self {
            Provider::DramaBox => Ok(DetailPlan {
                detail: request(format!("/dramabox/detail?bookId={id}"), "detail"),
                episodes: Some(request(format!("/dramabox/allepisode?bookId={id}"), "episodes")),
            }),
            Provider::Micro => Ok(DetailPlan {
                detail: request(format!("/micro/api/v1/drama/{id}"), "detail"),
                episodes: None,
            }),
            Provider::Tensei => Ok(DetailPlan {
                detail: request(format!("/tensei/detail/{id}"), "detail")
                    .header(tensei::SITE_HEADER.0, tensei::SITE_HEADER.1),
                episodes: None,
            }),
            Provider::MovieBox => Ok(DetailPlan {
                detail: request(format!("/moviebox/v1/info/{id}"), "detail"),
                episodes: Some(request(format!("/moviebox/v1/watch/{id}"), "watch")),
            }),
            Provider::NetShort | Provider::ReelShort | Provider::FlickReels => {
                Err(self.unsupported("detail"))
            }
        }
    }

    /// A follow-up request an episode needs before it can be resolved.
    pub fn source_request(self, endpoints: &Endpoints, episode: &Episode) -> Option<FetchRequest> {
        match self {
            Provider::Tensei => Some(
                FetchRequest::get(format!(
                    "{}/tensei/watch/{}",
                    self.base(endpoints),
                    urlencoding::encode(&episode.id)
                ))
                .labelled(format!("{self}:watch:{}", episode.id)),
            ),
            _ => None,
        }
    }

    /// Exchange a resolved media URL for the URL actually handed to the player.
    pub fn stream_handoff(self, endpoints: &Endpoints, url: &str) -> Option<FetchRequest> {
        match self {
            Provider::MovieBox => Some(
                FetchRequest::get(format!(
                    "{}/moviebox/v1/stream?url={}",
                    self.base(endpoints),
                    urlencoding::encode(url)
                ))
                .labelled(format!("{self}:stream")),
            ),
            _ => None,
        }
    }

    pub fn handoff_url(self, payload: &Value) -> Option<String> {
        match self {
            Provider::MovieBox => moviebox::stream_url(payload),
            _ => None,
        }
    }

    // ── Payload mapping ──────────────────────────────────────────────────────

    /// Whether another listing page is worth requesting.
    pub fn has_more(self, payload: &Value, page_len: usize) -> bool {
        match self {
            Provider::MovieBox => moviebox::has_more(payload).unwrap_or(page_len > 0),
            Provider::Micro => page_len >= micro::PAGE_SIZE,
            _ => page_len > 0,
        }
    }

    fn detail_record(self, payload: &Value) -> &Value {
        match self {
            Provider::Micro => micro::detail_record(payload),
            Provider::Tensei => tensei::detail_record(payload),
            Provider::MovieBox => moviebox::detail_record(payload),
            _ => shortdrama::detail_record(payload),
        }
    }

    /// Items of a feed payload: a list in any known envelope, or a single record.
    pub fn feed_items(self, payload: &Value) -> Vec<ContentItem> {
        let items = normalize_list(payload, self);
        if !items.is_empty() {
            return items;
        }
        normalize(Some(self.detail_record(payload)), self).into_iter().collect()
    }

    /// The detail record for `raw_id`. A missing payload degrades to an id-only item.
    pub fn detail_item(self, payload: Option<&Value>, raw_id: &str) -> ContentItem {
        let record = payload.map(|p| self.detail_record(p));

        normalize(record, self).unwrap_or_else(|| {
            let bare = json!({ self.id_field(): raw_id });
            ProviderItem::new(self, &bare)
                .normalize()
                .unwrap_or_else(|| ContentItem::bare(namespaced(self, raw_id)))
        })
    }

    pub fn episodes(self, detail: Option<&Value>, episodes: Option<&Value>) -> Vec<Episode> {
        match self {
            Provider::Micro => detail.map(micro::episodes),
            Provider::Tensei => detail.map(tensei::episodes),
            Provider::MovieBox => episodes.map(moviebox::episodes),
            _ => episodes.map(shortdrama::chapters),
        }
        .unwrap_or_default()
    }

    /// Delivery nodes plus the flat fallback URL for a raw episode (or tensei watch payload).
    pub fn delivery(self, raw: &Value) -> (Vec<DeliveryNode>, Option<String>) {
        match self {
            Provider::Micro => (micro::delivery(raw), None),
            Provider::Tensei => (tensei::delivery(raw), flat_source(&raw["data"], &tensei::FLAT_FIELDS)),
            Provider::MovieBox => (moviebox::delivery(raw), flat_source(raw, &moviebox::FLAT_FIELDS)),
            _ => (cdn_nodes(raw), flat_source(raw, &FLAT_SOURCE_FIELDS)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Provider {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .into_iter()
            .find(|p| p.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownProvider(s.to_string()))
    }
}

/// Named DramaBox feeds outside the paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Latest,
    Vip,
    DubIndo,
    Random,
    PopularSearch,
}

impl Feed {
    pub const ALL: [Feed; 5] = [Feed::Latest, Feed::Vip, Feed::DubIndo, Feed::Random, Feed::PopularSearch];

    pub fn tag(self) -> &'static str {
        match self {
            Feed::Latest => "latest",
            Feed::Vip => "vip",
            Feed::DubIndo => "dubindo",
            Feed::Random => "random",
            Feed::PopularSearch => "popularsearch",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Feed::Latest => "latest",
            Feed::Vip => "vip",
            Feed::DubIndo => "dubindo",
            Feed::Random => "randomdrama",
            Feed::PopularSearch => "populersearch",
        }
    }

    /// A random pick must be fetched fresh every time.
    pub fn is_cacheable(self) -> bool {
        !matches!(self, Feed::Random)
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Feed {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Feed::ALL
            .into_iter()
            .find(|f| f.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownFeed(s.to_string()))
    }
}

/// Upstream base URLs. The short-drama family shares one host, the rest share another.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub shortdrama: String,
    pub dramabos: String,
}

impl Endpoints {
    pub fn new(shortdrama: impl Into<String>, dramabos: impl Into<String>) -> Self {
        Self {
            shortdrama: shortdrama.into().trim_end_matches('/').to_string(),
            dramabos: dramabos.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.shortdrama_base, &config.dramabos_base)
    }
}

/// Requests behind one detail page, fetched concurrently.
#[derive(Debug, Clone)]
pub struct DetailPlan {
    pub detail: FetchRequest,
    pub episodes: Option<FetchRequest>,
}

// ── Normalization ────────────────────────────────────────────────────────────

/// The `provider:raw` id an item is published under.
pub(crate) fn namespaced(provider: Provider, raw: &str) -> String {
    ContentId::new(provider, raw).to_string()
}

/// A raw upstream record tagged with the provider that produced it.
#[derive(Debug, Clone, Copy)]
pub enum ProviderItem<'a> {
    DramaBox(&'a Value),
    NetShort(&'a Value),
    ReelShort(&'a Value),
    FlickReels(&'a Value),
    Micro(&'a Value),
    Tensei(&'a Value),
    MovieBox(&'a Value),
}

impl<'a> ProviderItem<'a> {
    pub fn new(provider: Provider, raw: &'a Value) -> Self {
        match provider {
            Provider::DramaBox => ProviderItem::DramaBox(raw),
            Provider::NetShort => ProviderItem::NetShort(raw),
            Provider::ReelShort => ProviderItem::ReelShort(raw),
            Provider::FlickReels => ProviderItem::FlickReels(raw),
            Provider::Micro => ProviderItem::Micro(raw),
            Provider::Tensei => ProviderItem::Tensei(raw),
            Provider::MovieBox => ProviderItem::MovieBox(raw),
        }
    }

    pub fn normalize(self) -> Option<ContentItem> {
        match self {
            ProviderItem::DramaBox(raw) => shortdrama::normalize_dramabox(raw),
            ProviderItem::NetShort(raw) => shortdrama::normalize_netshort(raw),
            ProviderItem::ReelShort(raw) => shortdrama::normalize_reelshort(raw),
            ProviderItem::FlickReels(raw) => shortdrama::normalize_flickreels(raw),
            ProviderItem::Micro(raw) => micro::normalize(raw),
            ProviderItem::Tensei(raw) => tensei::normalize(raw),
            ProviderItem::MovieBox(raw) => moviebox::normalize(raw),
        }
    }
}

/// Map one raw record to a [`ContentItem`]. Absent, null, non-object, or id-less input yields
/// `None`; a returned item always has a non-empty id and title.
pub fn normalize(raw: Option<&Value>, provider: Provider) -> Option<ContentItem> {
    let raw = raw.filter(|v| v.is_object())?;
    ProviderItem::new(provider, raw).normalize()
}

/// Unwrap a listing payload and normalize every record, dropping the ones that do not map.
pub fn normalize_list(payload: &Value, provider: Provider) -> Vec<ContentItem> {
    let raw = unwrap_list(payload);
    let items: Vec<ContentItem> = raw.iter().filter_map(|r| normalize(Some(r), provider)).collect();
    if items.len() < raw.len() {
        debug!(
            provider = provider.tag(),
            dropped = raw.len() - items.len(),
            "records without identity dropped"
        );
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::new("http://short/api/", "http://bos/api")
    }

    #[test]
    fn absent_or_malformed_input_normalizes_to_none() {
        for provider in Provider::ALL {
            assert!(normalize(None, provider).is_none());
            assert!(normalize(Some(&Value::Null), provider).is_none());
            assert!(normalize(Some(&json!("text")), provider).is_none());
            assert!(normalize(Some(&json!({})), provider).is_none());
        }
    }

    #[test]
    fn normalized_items_always_have_id_and_title() {
        for provider in Provider::ALL {
            let raw = json!({ provider.id_field(): "42" });
            let item = normalize(Some(&raw), provider).unwrap();
            assert_eq!(item.id, format!("{}:42", provider.tag()));
            assert!(!item.title.is_empty());
        }
    }

    #[test]
    fn namespaced_ids_parse_back() {
        let id = namespaced(Provider::Tensei, "one-piece:ep-1");
        assert_eq!(id, "tensei:one-piece:ep-1");
        assert_eq!(id.parse::<ContentId>().unwrap(), ContentId::new(Provider::Tensei, "one-piece:ep-1"));
    }

    #[test]
    fn provider_tags_parse_back() {
        for provider in Provider::ALL {
            assert_eq!(provider.tag().parse::<Provider>().unwrap(), provider);
        }
        assert!(matches!(
            "vimeo".parse::<Provider>(),
            Err(CatalogError::UnknownProvider(_))
        ));
    }

    #[test]
    fn dramabox_listing_spans_three_sources() {
        let urls: Vec<String> = Provider::DramaBox
            .listing_requests(&endpoints(), 2)
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://short/api/dramabox/trending?page=2",
                "http://short/api/dramabox/foryou?page=2",
                "http://short/api/dramabox/search?query=drama"
            ]
        );
    }

    #[test]
    fn named_feeds_are_dramabox_only() {
        let random = Provider::DramaBox.feed_request(&endpoints(), Feed::Random).unwrap();
        assert_eq!(random.url, "http://short/api/dramabox/randomdrama");
        let popular = Provider::DramaBox
            .feed_request(&endpoints(), "popularsearch".parse().unwrap())
            .unwrap();
        assert_eq!(popular.url, "http://short/api/dramabox/populersearch");
        assert!(matches!(
            Provider::Micro.feed_request(&endpoints(), Feed::Latest),
            Err(CatalogError::Unsupported { operation: "feed", .. })
        ));
        assert!(matches!("weekly".parse::<Feed>(), Err(CatalogError::UnknownFeed(_))));
    }

    #[test]
    fn single_record_feed_yields_one_item() {
        let items = Provider::DramaBox.feed_items(&json!({ "data": { "bookId": "9", "bookName": "Pick" } }));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "dramabox:9");
        assert!(Provider::DramaBox.feed_items(&json!({ "data": [] })).is_empty());
    }

    #[test]
    fn moviebox_pages_are_zero_based() {
        let requests = Provider::MovieBox.listing_requests(&endpoints(), 1);
        assert_eq!(requests[0].url, "http://bos/api/moviebox/v1/popular?p=0");
    }

    #[test]
    fn unsupported_operations_are_typed_errors() {
        assert!(matches!(
            Provider::ReelShort.search_request(&endpoints(), "ceo"),
            Err(CatalogError::Unsupported { provider: "reelshort", operation: "search" })
        ));
        assert!(Provider::NetShort.detail_plan(&endpoints(), "1").is_err());
    }

    #[test]
    fn search_query_is_encoded() {
        let request = Provider::Tensei.search_request(&endpoints(), "one piece").unwrap();
        assert_eq!(request.url, "http://bos/api/tensei/search?q=one%20piece");
    }

    #[test]
    fn missing_detail_degrades_to_id_only() {
        let item = Provider::DramaBox.detail_item(None, "777");
        assert_eq!(item.id, "dramabox:777");
        assert_eq!(item.title, "Untitled");
    }

    #[test]
    fn wrapped_detail_payload_is_unwrapped() {
        let payload = json!({ "data": { "bookId": "5", "bookName": "Found" } });
        let item = Provider::DramaBox.detail_item(Some(&payload), "5");
        assert_eq!(item.title, "Found");
    }

    #[test]
    fn micro_has_more_only_on_full_pages() {
        assert!(Provider::Micro.has_more(&Value::Null, 20));
        assert!(!Provider::Micro.has_more(&Value::Null, 7));
        assert!(!Provider::MovieBox.has_more(&json!({ "pager": { "hasMore": false } }), 12));
    }
}
