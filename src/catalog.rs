use std::borrow::Cow;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::debug_log::LogKind;
use crate::error::{CatalogError, Result};
use crate::merge::{attach_episodes, merge_unique};
use crate::model::{ContentId, ContentItem, Episode};
use crate::providers::{normalize_list, Endpoints, Feed, Provider};
use crate::stream::{resolve_nodes, ResolvedSource};
use crate::transport::{FetchRequest, Fetched, TransportClient};

/// Shortest query worth sending upstream.
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub provider: Provider,
    pub page: u32,
    pub items: Vec<ContentItem>,
    pub has_more: bool,
    /// Some feed was answered from an expired cache entry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// Aggregation over every provider: listings, search, detail and episode resolution.
#[derive(Clone)]
pub struct Catalog {
    transport: Arc<TransportClient>,
    endpoints: Endpoints,
}

impl Catalog {
    pub fn new(transport: Arc<TransportClient>, endpoints: Endpoints) -> Self {
        Self { transport, endpoints }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Arc::new(TransportClient::init(config)?),
            Endpoints::from_config(config),
        ))
    }

    pub fn transport(&self) -> &Arc<TransportClient> {
        &self.transport
    }

    /// One normalized page of a single provider. Multi-feed providers fail only when every
    /// feed fails.
    pub async fn listing(&self, provider: Provider, page: u32) -> Result<ListingPage> {
        let requests = provider.listing_requests(&self.endpoints, page);
        let results = join_all(requests.iter().map(|r| self.transport.fetch_cached(r))).await;

        let mut lists = Vec::with_capacity(results.len());
        let mut has_more = false;
        let mut stale = false;
        let mut last_error = None;
        for result in results {
            match result {
                Ok(fetched) => {
                    let items = normalize_list(&fetched.payload, provider);
                    has_more |= provider.has_more(&fetched.payload, items.len());
                    stale |= fetched.stale;
                    lists.push(items);
                }
                Err(e) => {
                    warn!(provider = provider.tag(), page, error = %e, "listing feed failed");
                    last_error = Some(e);
                }
            }
        }

        if lists.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(ListingPage {
            provider,
            page,
            items: merge_unique(lists),
            has_more,
            stale,
        })
    }

    /// A named, unpaged feed such as DramaBox's latest releases or a random pick.
    pub async fn feed(&self, provider: Provider, feed: Feed) -> Result<ListingPage> {
        let request = provider.feed_request(&self.endpoints, feed)?;
        let fetched = if feed.is_cacheable() {
            self.transport.fetch_cached(&request).await?
        } else {
            Fetched {
                payload: self.transport.fetch_resilient(&request).await?,
                stale: false,
            }
        };

        Ok(ListingPage {
            provider,
            page: 1,
            items: provider.feed_items(&fetched.payload),
            has_more: false,
            stale: fetched.stale,
        })
    }

    /// Page `page` of every provider, merged in provider order. Failing providers contribute
    /// nothing; only a failure of all of them is an error.
    pub async fn trending(&self, page: u32) -> Result<Vec<ContentItem>> {
        let results = join_all(Provider::ALL.iter().map(|p| self.listing(*p, page))).await;
        let total = results.len();

        let lists: Vec<Vec<ContentItem>> = results
            .into_iter()
            .filter_map(|r| r.ok().map(|listing| listing.items))
            .collect();

        if lists.is_empty() {
            self.transport
                .debug_log()
                .push(LogKind::Error, format!("trending page {page}: all {total} providers failed"), None);
            return Err(CatalogError::AllProvidersFailed);
        }
        if lists.len() < total {
            info!(page, ok = lists.len(), total, "trending settled with failures");
        }

        Ok(merge_unique(lists))
    }

    /// Search every provider that supports it. Queries under two characters return nothing.
    pub async fn search(&self, query: &str) -> Result<Vec<ContentItem>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(vec![]);
        }

        let searches: Vec<_> = Provider::ALL
            .iter()
            .filter_map(|p| p.search_request(&self.endpoints, query).ok().map(|r| (*p, r)))
            .collect();

        let results = join_all(searches.iter().map(|(_, request)| self.transport.fetch_cached(request))).await;

        let mut lists = Vec::new();
        for ((provider, _), result) in searches.iter().zip(results) {
            match result {
                Ok(fetched) => lists.push(normalize_list(&fetched.payload, *provider)),
                Err(e) => warn!(provider = provider.tag(), error = %e, "search failed"),
            }
        }

        if lists.is_empty() {
            return Err(CatalogError::AllProvidersFailed);
        }
        Ok(merge_unique(lists))
    }

    /// Detail record plus its ordered episode list.
    ///
    /// Detail and episode payloads are fetched concurrently. A missing detail payload degrades
    /// to an id-only item and missing episodes to an empty list; the request only fails when
    /// nothing came back at all.
    pub async fn detail(&self, id: &ContentId) -> Result<ContentItem> {
        let provider = id.provider;
        let plan = provider.detail_plan(&self.endpoints, &id.raw)?;

        let (detail, episodes) = tokio::join!(self.fetch_payload(&plan.detail), async {
            match &plan.episodes {
                Some(request) => Some(self.fetch_payload(request).await),
                None => None,
            }
        });

        let (detail, episodes) = match (detail, episodes) {
            (Err(e), None) | (Err(e), Some(Err(_))) => return Err(e),
            (detail, episodes) => (
                detail
                    .map_err(|e| warn!(%id, error = %e, "detail payload missing"))
                    .ok(),
                episodes.and_then(|r| r.map_err(|e| warn!(%id, error = %e, "episode list missing")).ok()),
            ),
        };

        let mut item = provider.detail_item(detail.as_ref(), &id.raw);
        let mut episodes = provider.episodes(detail.as_ref(), episodes.as_ref());

        if !provider.resolves_lazily() {
            for episode in &mut episodes {
                let (nodes, flat) = provider.delivery(&episode.qualities);
                if let Ok(source) = resolve_nodes(&nodes, flat.as_deref()) {
                    episode.attach_source(&source);
                }
            }

            let missing = episodes.iter().filter(|e| e.player_url.is_none()).count();
            if missing > 0 {
                self.transport.debug_log().push(
                    LogKind::Warn,
                    format!("{id}: {missing} of {} episodes have no playable URL", episodes.len()),
                    None,
                );
            }
        }

        debug!(%id, episodes = episodes.len(), "detail assembled");
        attach_episodes(&mut item, episodes);
        Ok(item)
    }

    /// Resolve the playable source of episode `index` (1-based).
    pub async fn resolve_episode(&self, id: &ContentId, index: u32) -> Result<ResolvedSource> {
        let item = self.detail(id).await?;
        let episode = item
            .episodes
            .iter()
            .find(|e| e.index == index)
            .ok_or(CatalogError::NoPlayableSource)?;
        self.resolve(id.provider, episode).await
    }

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<Value> {
        self.transport.fetch_cached(request).await.map(|fetched| fetched.payload)
    }

    async fn resolve(&self, provider: Provider, episode: &Episode) -> Result<ResolvedSource> {
        let raw: Cow<'_, Value> = match provider.source_request(&self.endpoints, episode) {
            Some(request) => Cow::Owned(self.fetch_payload(&request).await?),
            None => Cow::Borrowed(&episode.qualities),
        };

        let (nodes, flat) = provider.delivery(&raw);
        let source = resolve_nodes(&nodes, flat.as_deref())?.with_subtitles(episode.subtitles.clone());

        let Some(request) = provider.stream_handoff(&self.endpoints, &source.url) else {
            return Ok(source);
        };
        // handed-off stream URLs are short-lived, never cache them
        let payload = self.transport.fetch_resilient(&request).await?;
        let url = provider
            .handoff_url(&payload)
            .ok_or(CatalogError::NoPlayableSource)?;
        Ok(source.redirect(url))
    }
}
