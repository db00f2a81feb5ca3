use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::stream::ResolvedSource;
use crate::subtitle::SubtitleTranscoder;
use crate::transport::TransportClient;

/// The source currently selected for one viewer, plus its subtitle tracks.
///
/// Every [`switch`](Self::switch) takes a new epoch. A switch that finishes after a newer one
/// began is discarded, so a slow resolve can never overwrite the newer selection.
pub struct PlaybackSession {
    epoch: AtomicU64,
    current: RwLock<Option<ResolvedSource>>,
    subtitles: SubtitleTranscoder,
}

impl PlaybackSession {
    pub fn new(transport: Arc<TransportClient>) -> Self {
        Self {
            epoch: AtomicU64::new(0),
            current: RwLock::new(None),
            subtitles: SubtitleTranscoder::new(transport),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub async fn current(&self) -> Option<ResolvedSource> {
        self.current.read().await.clone()
    }

    /// Run `resolve` and commit its result unless a newer switch or reset started meanwhile.
    /// Returns `Ok(None)` for a superseded switch, whether it succeeded or failed.
    pub async fn switch<F>(&self, resolve: F) -> Result<Option<ResolvedSource>>
    where
        F: Future<Output = Result<ResolvedSource>>,
    {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let outcome = resolve.await;

        let mut current = self.current.write().await;
        if self.epoch() != epoch {
            debug!(epoch, latest = self.epoch(), "discarding superseded source");
            return Ok(None);
        }

        let source = outcome?;
        *current = Some(source.clone());
        Ok(Some(source))
    }

    /// Forget the selection and every loaded subtitle track; pending switches become stale.
    pub async fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *self.current.write().await = None;
        self.subtitles.clear();
    }

    /// Converted subtitle track for `language`, cached for the life of the selection. Only
    /// tracks offered by the current source can be loaded.
    pub async fn subtitle(&self, language: &str) -> Result<Arc<String>> {
        let url = self
            .current
            .read()
            .await
            .as_ref()
            .and_then(|source| source.subtitle(language))
            .map(|track| track.url.clone())
            .ok_or_else(|| CatalogError::UnknownSubtitle(language.to_string()))?;
        self.subtitles.load(language, &url).await
    }
}
