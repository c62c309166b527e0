use crate::domain::rating::RatingEvent;
use crate::storage::query::{ListQuery, RatingFilter};
use crate::storage::{validate_batch, RatingEventStore, SyncRun};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

const SELECT_COLUMNS: &str = "SELECT ticker, company, target_from, target_to, action, brokerage, \
                              rating_from, rating_to, time FROM rating_events";

type RatingRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
);

fn row_into_event(row: RatingRow) -> RatingEvent {
    let (ticker, company, target_from, target_to, action, brokerage, rating_from, rating_to, time) =
        row;
    RatingEvent {
        ticker,
        company,
        target_from,
        target_to,
        action,
        brokerage,
        rating_from,
        rating_to,
        time,
    }
}

#[derive(Debug, Clone)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RatingEventStore for PgRatingStore {
    async fn save_all(&self, events: &[RatingEvent]) -> anyhow::Result<u64> {
        validate_batch(events)?;
        if events.is_empty() {
            return Ok(0);
        }

        // One statement per event so a failure names its ticker; duplicates within a batch
        // resolve last-write-wins instead of tripping ON CONFLICT twice.
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        let t0 = std::time::Instant::now();
        let mut affected: u64 = 0;

        for event in events {
            let res = sqlx::query(
                "INSERT INTO rating_events \
                   (ticker, company, target_from, target_to, action, brokerage, rating_from, rating_to, time) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (ticker) DO UPDATE SET \
                   company = EXCLUDED.company, \
                   target_from = EXCLUDED.target_from, \
                   target_to = EXCLUDED.target_to, \
                   action = EXCLUDED.action, \
                   brokerage = EXCLUDED.brokerage, \
                   rating_from = EXCLUDED.rating_from, \
                   rating_to = EXCLUDED.rating_to, \
                   time = EXCLUDED.time",
            )
            .persistent(false)
            .bind(&event.ticker)
            .bind(&event.company)
            .bind(&event.target_from)
            .bind(&event.target_to)
            .bind(&event.action)
            .bind(&event.brokerage)
            .bind(&event.rating_from)
            .bind(&event.rating_to)
            .bind(event.time)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upsert rating_events failed (ticker={})", event.ticker))?;
            affected += res.rows_affected();
        }

        tx.commit().await.context("commit transaction failed")?;

        tracing::debug!(
            batch_size = events.len(),
            affected,
            elapsed_ms = t0.elapsed().as_millis(),
            "rating_events batch upsert"
        );
        Ok(affected)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RatingEvent>> {
        let rows = sqlx::query_as::<_, RatingRow>(&format!(
            "{SELECT_COLUMNS} WHERE time BETWEEN $1 AND $2 ORDER BY time DESC, ticker COLLATE \"C\" ASC"
        ))
        .persistent(false)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("query rating_events by time window failed")?;

        Ok(rows.into_iter().map(row_into_event).collect())
    }

    async fn find_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<RatingEvent>> {
        let row = sqlx::query_as::<_, RatingRow>(&format!("{SELECT_COLUMNS} WHERE ticker = $1"))
            .persistent(false)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("query rating_events by ticker failed (ticker={ticker})"))?;

        Ok(row.map(row_into_event))
    }

    async fn list(&self, query: &ListQuery) -> anyhow::Result<Vec<RatingEvent>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        query.filter.push_where(&mut qb);
        query.push_order_and_page(&mut qb);

        let rows = qb
            .build_query_as::<RatingRow>()
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("list rating_events failed (filter={:?})", query.filter))?;

        Ok(rows.into_iter().map(row_into_event).collect())
    }

    async fn count(&self, filter: &RatingFilter) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM rating_events");
        filter.push_where(&mut qb);

        let (total,): (i64,) = qb
            .build_query_as::<(i64,)>()
            .persistent(false)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("count rating_events failed (filter={filter:?})"))?;
        Ok(total)
    }

    async fn record_sync_run(&self, run: &SyncRun) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_runs (id, started_at, finished_at, status, fetched, saved, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .persistent(false)
        .bind(run.id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.status.as_str())
        .bind(run.fetched)
        .bind(run.saved)
        .bind(run.error.as_deref())
        .execute(&self.pool)
        .await
        .context("insert sync_runs failed")?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .persistent(false)
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}
