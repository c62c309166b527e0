pub mod lock;
pub mod memory;
pub mod postgres;
pub mod query;

pub use memory::MemoryRatingStore;
pub use postgres::PgRatingStore;
pub use query::{ListQuery, RatingFilter, SortField, SortOrder};

use crate::domain::rating::RatingEvent;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

/// Outcome of one ingestion run, kept for operators.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub fetched: i64,
    pub saved: i64,
    pub error: Option<String>,
}

/// Persistence for rating events, keyed by ticker.
#[async_trait::async_trait]
pub trait RatingEventStore: Send + Sync {
    /// Upserts the whole batch atomically; returns the number of rows written.
    async fn save_all(&self, events: &[RatingEvent]) -> anyhow::Result<u64>;

    /// Events with `start <= time <= end`, newest first.
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RatingEvent>>;

    async fn find_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<RatingEvent>>;

    async fn list(&self, query: &ListQuery) -> anyhow::Result<Vec<RatingEvent>>;

    /// Total matches for `filter`; agrees with paginating `list` over the same filter.
    async fn count(&self, filter: &RatingFilter) -> anyhow::Result<i64>;

    async fn record_sync_run(&self, run: &SyncRun) -> anyhow::Result<()>;

    async fn ping(&self) -> anyhow::Result<()>;
}

fn validate_batch(events: &[RatingEvent]) -> anyhow::Result<()> {
    for (idx, event) in events.iter().enumerate() {
        event
            .validate()
            .with_context(|| format!("invalid rating event at index {idx}"))?;
    }
    Ok(())
}
