//! The chat-ingestion engine.
//!
//! A periodic scan picks up every live stream whose reading is not finished
//! and whose scheduled start is close enough, and spawns one detached worker
//! per stream. Workers race for a distributed lock keyed by the stream id,
//! so any number of scans (in this process or another) may pick the same
//! stream; only the lock holder reads it. The cursor is advanced only after
//! a batch has been fully persisted, which together with id-idempotent
//! writes gives effectively-once ingestion.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::domain::{Author, Ban, ChatMessages, Donate, LiveStreamProgress, TextMessage};
use crate::error::StreamError;

#[async_trait]
pub trait Locker: Send + Sync {
    /// Try to acquire the lock for the given key. Returns `false` without
    /// blocking if the lock is already held by anyone. The acquired lease
    /// expires on its own if the holder dies.
    async fn lock(&self, key: &str) -> anyhow::Result<bool>;

    async fn release(&self, key: &str) -> anyhow::Result<()>;
}

pub trait ChatMessageStreamer: Send + Sync {
    /// Stream chat batches and errors through the returned channels. The
    /// stream stops when the batch channel closes and can also be stopped
    /// through the cancellation token.
    ///
    /// A missing chat must surface as [`StreamError::ChatNotFound`], a chat
    /// that has gone offline as [`StreamError::ChatOffline`], and resource
    /// exhaustion as [`StreamError::UnavailableLiveStream`].
    fn stream_chat_messages(
        &self,
        cancel: CancellationToken,
        progress: &LiveStreamProgress,
    ) -> (
        mpsc::Receiver<ChatMessages>,
        mpsc::Receiver<StreamError>,
    );
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn upsert(&self, progress: &LiveStreamProgress) -> anyhow::Result<()>;

    /// Progress of live streams that have started or will start within the
    /// given duration, excluding finished ones.
    async fn started(&self, starts_within: Duration) -> anyhow::Result<Vec<LiveStreamProgress>>;
}

#[async_trait]
pub trait TextMessageRepository: Send + Sync {
    /// Insert the given text messages, ignoring duplicates.
    async fn insert(&self, messages: &[TextMessage]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait BanRepository: Send + Sync {
    /// Insert the given bans, ignoring duplicates.
    async fn insert(&self, bans: &[Ban]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait DonateRepository: Send + Sync {
    /// Insert the given donates, ignoring duplicates.
    async fn insert(&self, donates: &[Donate]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn upsert(&self, authors: &[Author]) -> anyhow::Result<()>;
}

const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_RELEASE_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("retry interval must be between 10 seconds and 1 minute")]
    InvalidRetryInterval,

    #[error("advance start must be between 1 minute and 1 hour")]
    InvalidAdvanceStart,
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Interval between scans for readable live streams.
    pub retry_interval: Duration,
    /// How much earlier than its scheduled start a live stream becomes
    /// eligible for reading.
    pub advance_start: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(10),
            advance_start: Duration::from_secs(30 * 60),
        }
    }
}

impl ReaderOptions {
    fn validate(&self) -> Result<(), EngineError> {
        if self.retry_interval < Duration::from_secs(10)
            || self.retry_interval > Duration::from_secs(60)
        {
            return Err(EngineError::InvalidRetryInterval);
        }

        if self.advance_start < Duration::from_secs(60)
            || self.advance_start > Duration::from_secs(3600)
        {
            return Err(EngineError::InvalidAdvanceStart);
        }

        Ok(())
    }
}

struct Deps {
    locker: Arc<dyn Locker>,
    streamer: Arc<dyn ChatMessageStreamer>,
    progress: Arc<dyn ProgressRepository>,
    texts: Arc<dyn TextMessageRepository>,
    bans: Arc<dyn BanRepository>,
    donates: Arc<dyn DonateRepository>,
    authors: Arc<dyn AuthorRepository>,
}

/// Continuously reads chat of started or upcoming live streams until they
/// finish. Stopped through the cancellation token passed to [`run`].
///
/// [`run`]: LiveStreamReader::run
pub struct LiveStreamReader {
    deps: Arc<Deps>,
    retry_interval: Duration,
    advance_start: Duration,
    tracker: TaskTracker,
}

impl LiveStreamReader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        locker: Arc<dyn Locker>,
        streamer: Arc<dyn ChatMessageStreamer>,
        progress: Arc<dyn ProgressRepository>,
        texts: Arc<dyn TextMessageRepository>,
        bans: Arc<dyn BanRepository>,
        donates: Arc<dyn DonateRepository>,
        authors: Arc<dyn AuthorRepository>,
        opts: ReaderOptions,
    ) -> Result<Self, EngineError> {
        opts.validate()?;

        Ok(Self {
            deps: Arc::new(Deps {
                locker,
                streamer,
                progress,
                texts,
                bans,
                donates,
                authors,
            }),
            retry_interval: opts.retry_interval,
            advance_start: opts.advance_start,
            tracker: TaskTracker::new(),
        })
    }

    /// Run scans until cancelled, then wait for every in-flight worker.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick = interval(self.retry_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => self.scan(&cancel).await,
                _ = cancel.cancelled() => {
                    info!("Stopping read...");
                    self.tracker.close();
                    self.tracker.wait().await;
                    info!("Reading stopped");

                    return;
                }
            }
        }
    }

    async fn scan(&self, cancel: &CancellationToken) {
        let progress = match self.deps.progress.started(self.advance_start).await {
            Ok(progress) => progress,
            Err(err) => {
                error!(error = %err, "Failed to fetch started live streams progress");
                return;
            }
        };

        for lsp in progress {
            let deps = self.deps.clone();
            let cancel = cancel.clone();

            self.tracker.spawn(async move {
                let live_stream_id = lsp.id().to_string();

                if let Err(err) = read_live_stream(deps, cancel, lsp).await {
                    error!(%live_stream_id, error = %err, "Failed to read live stream");
                }
            });
        }
    }
}

async fn read_live_stream(
    deps: Arc<Deps>,
    cancel: CancellationToken,
    mut lsp: LiveStreamProgress,
) -> anyhow::Result<()> {
    let key = lsp.id().to_string();

    if !try_lock(&deps, &key).await {
        return Ok(());
    }

    // Stops the underlying stream as soon as this worker exits.
    let stream_cancel = cancel.child_token();

    let result = drive(&deps, &stream_cancel, &mut lsp).await;

    stream_cancel.cancel();
    release(&deps, &key).await;

    result
}

async fn drive(
    deps: &Deps,
    cancel: &CancellationToken,
    lsp: &mut LiveStreamProgress,
) -> anyhow::Result<()> {
    let (mut batches, mut errors) = deps.streamer.stream_chat_messages(cancel.clone(), lsp);

    // The streamer closes both channels together when it stops, so batches
    // buffered ahead of the closure are still drained, and a buffered error
    // is looked for once the batch channel closes.
    let mut errors_open = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(()),
            maybe_err = errors.recv(), if errors_open => {
                match maybe_err {
                    Some(err) => return handle_stream_error(deps, lsp, err).await,
                    None => errors_open = false,
                }
            }
            maybe_batch = batches.recv() => {
                let Some(cm) = maybe_batch else {
                    if errors_open {
                        if let Ok(err) = errors.try_recv() {
                            return handle_stream_error(deps, lsp, err).await;
                        }
                    }

                    debug!(live_stream_id = lsp.id(), "Streaming channel closed");
                    return Ok(());
                };

                if !cm.next_page_token().is_empty() {
                    lsp.set_next_page_token(cm.next_page_token());
                } else {
                    lsp.finish(Utc::now(), "empty next page token");
                }

                store(deps, lsp, &cm).await?;

                info!(
                    live_stream_id = lsp.id(),
                    next_page_token = cm.next_page_token(),
                    texts = cm.text_messages().len(),
                    donates = cm.donates().len(),
                    bans = cm.bans().len(),
                    authors = cm.authors().len(),
                    "Chat stored"
                );

                if lsp.is_finished() {
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_stream_error(
    deps: &Deps,
    lsp: &mut LiveStreamProgress,
    err: StreamError,
) -> anyhow::Result<()> {
    error!(live_stream_id = lsp.id(), error = %err, "Streaming failed");

    if !err.is_terminal() {
        return Err(err.into());
    }

    lsp.finish(Utc::now(), err.to_string());

    deps.progress
        .upsert(lsp)
        .await
        .context("upsert live stream progress")?;

    Ok(())
}

/// Persist one batch across the four stores, then advance the cursor. The
/// cursor moves only after every store write has succeeded, so a failed
/// batch is re-read from the same cursor and its duplicates are absorbed by
/// the id-keyed inserts.
async fn store(
    deps: &Deps,
    lsp: &LiveStreamProgress,
    cm: &ChatMessages,
) -> anyhow::Result<()> {
    let authors = cm.authors();
    let bans = cm.bans();
    let texts = cm.text_messages();
    let donates = cm.donates();

    tokio::try_join!(
        async { deps.authors.upsert(&authors).await.context("insert to authors repo") },
        async { deps.bans.insert(&bans).await.context("insert to bans repo") },
        async { deps.texts.insert(&texts).await.context("insert to text messages repo") },
        async { deps.donates.insert(&donates).await.context("insert to donates repo") },
    )?;

    deps.progress
        .upsert(lsp)
        .await
        .context("upsert live stream progress")?;

    Ok(())
}

async fn try_lock(deps: &Deps, key: &str) -> bool {
    match timeout(LOCK_ACQUIRE_TIMEOUT, deps.locker.lock(key)).await {
        Err(_) => {
            error!(live_stream_id = key, "Lock acquisition timed out");
            false
        }
        Ok(Err(err)) => {
            error!(live_stream_id = key, error = %err, "Failed to acquire lock");
            false
        }
        Ok(Ok(false)) => {
            debug!(live_stream_id = key, "Locked by another reader");
            false
        }
        Ok(Ok(true)) => {
            debug!(live_stream_id = key, "Lock acquired");
            true
        }
    }
}

/// Best-effort release with its own short deadline, so it still runs during
/// shutdown after the parent cancellation has fired.
async fn release(deps: &Deps, key: &str) {
    match timeout(LOCK_RELEASE_TIMEOUT, deps.locker.release(key)).await {
        Err(_) => error!(live_stream_id = key, "Release lock timed out"),
        Ok(Err(err)) => error!(live_stream_id = key, error = %err, "Release lock failed"),
        Ok(Ok(())) => debug!(live_stream_id = key, "Lock released"),
    }
}
