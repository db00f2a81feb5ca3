//! Scroll-driven incremental loading over any paged source.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::merge::merge_page;
use crate::model::ContentItem;
use crate::providers::Provider;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Items of 1-based page `page`. An empty page means the source is exhausted.
    async fn fetch_page(&self, page: u32) -> Result<Vec<ContentItem>>;
}

/// One provider's listing, or every provider merged when `provider` is `None`.
pub struct CatalogFeed {
    catalog: Catalog,
    provider: Option<Provider>,
}

impl CatalogFeed {
    pub fn new(catalog: Catalog, provider: Option<Provider>) -> Self {
        Self { catalog, provider }
    }
}

#[async_trait]
impl PageSource for CatalogFeed {
    async fn fetch_page(&self, page: u32) -> Result<Vec<ContentItem>> {
        match self.provider {
            Some(provider) => Ok(self.catalog.listing(provider, page).await?.items),
            None => self.catalog.trending(page).await,
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    next_page: u32,
    items: Vec<ContentItem>,
    initial_loaded: bool,
    exhausted: bool,
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Accumulates pages from a [`PageSource`]; at most one fetch is ever in flight.
pub struct Paginator {
    source: Box<dyn PageSource>,
    threshold_px: f64,
    in_flight: AtomicBool,
    state: Mutex<FeedState>,
}

impl Paginator {
    pub fn new(source: impl PageSource + 'static, threshold_px: f64) -> Self {
        Self {
            source: Box::new(source),
            threshold_px,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(FeedState {
                next_page: 1,
                ..FeedState::default()
            }),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn items(&self) -> Vec<ContentItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn page(&self) -> u32 {
        self.state.lock().await.next_page.saturating_sub(1)
    }

    pub async fn has_more(&self) -> bool {
        !self.state.lock().await.exhausted
    }

    /// Load the first page. Returns `Ok(None)` when it is already loaded or loading.
    pub async fn load_initial(&self) -> Result<Option<usize>> {
        if self.state.lock().await.initial_loaded {
            return Ok(None);
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            return Ok(None);
        };
        self.fetch_next().await.map(Some)
    }

    /// React to a scroll position `distance_px` from the bottom of the content.
    ///
    /// Fetches the next page only when inside the threshold, after the initial page, and while
    /// nothing else is loading. Returns how many new items were merged, or `None` if ignored.
    pub async fn on_scroll(&self, distance_px: f64) -> Result<Option<usize>> {
        if distance_px >= self.threshold_px {
            return Ok(None);
        }
        {
            let state = self.state.lock().await;
            if !state.initial_loaded || state.exhausted {
                return Ok(None);
            }
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("scroll ignored, page already loading");
            return Ok(None);
        };
        self.fetch_next().await.map(Some)
    }

    async fn fetch_next(&self) -> Result<usize> {
        let page = self.state.lock().await.next_page;
        let items = self.source.fetch_page(page).await.map_err(|e| {
            warn!(page, error = %e, "page fetch failed");
            e
        })?;

        let mut state = self.state.lock().await;
        state.initial_loaded = true;
        state.next_page = page + 1;
        if items.is_empty() {
            state.exhausted = true;
            return Ok(0);
        }
        Ok(merge_page(&mut state.items, items))
    }
}
