use crate::feed::{fetch_all, FeedClient, FeedError, FetchOptions};
use crate::storage::{RatingEventStore, SyncRun, SyncStatus};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub saved: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Started { run_id: Uuid },
    AlreadyRunning,
}

/// Feed-to-store ingestion. At most one run per service instance is in flight at a time.
pub struct SyncService {
    feed: Arc<dyn FeedClient>,
    store: Arc<dyn RatingEventStore>,
    options: FetchOptions,
    in_flight: Arc<Mutex<()>>,
}

impl SyncService {
    pub fn new(
        feed: Arc<dyn FeedClient>,
        store: Arc<dyn RatingEventStore>,
        options: FetchOptions,
    ) -> Self {
        Self {
            feed,
            store,
            options,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Whether the feed credential would pass the pre-flight check in [`Self::trigger`].
    pub fn feed_configured(&self) -> bool {
        self.feed.ensure_configured().is_ok()
    }

    /// Fetches every feed page and upserts the result as one batch, bounded by the sync deadline.
    pub async fn run_once(&self, run_id: Uuid) -> anyhow::Result<SyncReport> {
        let mut fetched = 0;
        self.run_bounded(run_id, &mut fetched).await
    }

    /// `fetched` is set as soon as the feed is drained, so a failed save still reports it.
    async fn run_bounded(&self, run_id: Uuid, fetched: &mut usize) -> anyhow::Result<SyncReport> {
        let started = Instant::now();
        let steps = self.fetch_and_save(run_id, started, fetched);

        let Some(budget) = self.options.deadline else {
            return steps.await;
        };
        match tokio::time::timeout(budget, steps).await {
            Ok(result) => result,
            // Dropping an unfinished save rolls its transaction back.
            Err(_) => Err(FeedError::DeadlineExceeded {
                elapsed: started.elapsed(),
            }
            .into()),
        }
    }

    async fn fetch_and_save(
        &self,
        run_id: Uuid,
        started: Instant,
        fetched: &mut usize,
    ) -> anyhow::Result<SyncReport> {
        let events = fetch_all(self.feed.as_ref(), &self.options).await?;
        *fetched = events.len();
        if events.is_empty() {
            tracing::warn!(%run_id, "feed returned no rating events; nothing to save");
        }

        let saved = self
            .store
            .save_all(&events)
            .await
            .context("saving rating events failed")?;

        Ok(SyncReport {
            run_id,
            fetched: events.len(),
            saved,
            elapsed: started.elapsed(),
        })
    }

    /// Runs a sync and records its outcome. Failures are logged, never returned.
    pub async fn run_and_record(&self, run_id: Uuid) -> Option<SyncReport> {
        let started_at = Utc::now();
        let mut fetched = 0;
        let result = self.run_bounded(run_id, &mut fetched).await;
        let finished_at = Utc::now();

        let run = match &result {
            Ok(report) => {
                tracing::info!(
                    %run_id,
                    fetched = report.fetched,
                    saved = report.saved,
                    elapsed_ms = report.elapsed.as_millis(),
                    "sync completed"
                );
                SyncRun {
                    id: run_id,
                    started_at,
                    finished_at,
                    status: SyncStatus::Success,
                    fetched: report.fetched as i64,
                    saved: report.saved as i64,
                    error: None,
                }
            }
            Err(err) => {
                let permanent = err
                    .downcast_ref::<FeedError>()
                    .is_some_and(FeedError::is_permanent);
                let detail = format!("{err:#}");
                tracing::error!(%run_id, permanent, fetched, error = %detail, "sync failed");
                SyncRun {
                    id: run_id,
                    started_at,
                    finished_at,
                    status: SyncStatus::Error,
                    fetched: fetched as i64,
                    saved: 0,
                    error: Some(detail),
                }
            }
        };

        // Best-effort: the run outcome is already logged.
        if let Err(err) = self.store.record_sync_run(&run).await {
            tracing::warn!(%run_id, error = %err, "failed to record sync run");
        }

        result.ok()
    }

    /// Starts a background sync and returns immediately.
    ///
    /// A missing credential fails here, before anything is spawned.
    pub fn trigger(self: &Arc<Self>) -> Result<SyncTrigger, FeedError> {
        self.feed.ensure_configured()?;

        let Ok(guard) = Arc::clone(&self.in_flight).try_lock_owned() else {
            tracing::info!("sync already in progress; ignoring trigger");
            return Ok(SyncTrigger::AlreadyRunning);
        };

        let run_id = Uuid::new_v4();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            tracing::info!(%run_id, feed = this.feed.feed_name(), "sync started");
            this.run_and_record(run_id).await;
        });

        Ok(SyncTrigger::Started { run_id })
    }
}
