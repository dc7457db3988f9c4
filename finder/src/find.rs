use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::LiveStream;
use crate::error::FinderResult;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Identifiers of upcoming live streams for the specified channel.
    async fn search_upcoming(&self, channel_id: &str) -> FinderResult<Vec<String>>;

    /// Live streams for the given video ids that have chat enabled and have
    /// not finished.
    async fn list_live_streams(&self, video_ids: &[String]) -> FinderResult<Vec<LiveStream>>;
}

#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Which of the given live stream ids are already persisted.
    async fn existing(&self, ids: &[String]) -> FinderResult<Vec<String>>;

    /// Persist the live streams and their found-events atomically. Already
    /// persisted streams are skipped.
    async fn persist(&self, live_streams: &[LiveStream]) -> FinderResult<()>;
}

pub struct LiveStreamFinder {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn StreamStore>,
}

impl LiveStreamFinder {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn StreamStore>) -> Self {
        Self { catalog, store }
    }

    /// Discover upcoming live streams for the provided channels and persist
    /// the ones not seen before, together with their outbox events.
    pub async fn find(&self, channel_ids: &[String]) -> FinderResult<()> {
        let mut found_ids = Vec::new();

        for channel_id in channel_ids {
            let channel_found = self.catalog.search_upcoming(channel_id).await?;
            debug!(channel_id, count = channel_found.len(), "upcoming search done");
            found_ids.extend(channel_found);
        }

        if found_ids.is_empty() {
            return Ok(());
        }

        let existing: HashSet<String> =
            self.store.existing(&found_ids).await?.into_iter().collect();

        let new_ids: Vec<String> = found_ids
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();

        if new_ids.is_empty() {
            return Ok(());
        }

        let live_streams = self.catalog.list_live_streams(&new_ids).await?;
        if live_streams.is_empty() {
            return Ok(());
        }

        self.store.persist(&live_streams).await?;

        info!(count = live_streams.len(), "new live streams found");

        Ok(())
    }
}
