use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the lock keeps its pooled connection
// checked out until it is released. Used to stop two syncs from overlapping across processes.
const SYNC_LOCK_KEY: i64 = 0x5241_5449_4E47; // "RATING"

pub struct SyncLock {
    conn: Option<PoolConnection<Postgres>>,
}

pub async fn try_acquire_sync_lock(pool: &sqlx::PgPool) -> anyhow::Result<Option<SyncLock>> {
    let mut conn = pool
        .acquire()
        .await
        .context("failed to check out connection for sync lock")?;

    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(SYNC_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={SYNC_LOCK_KEY})"))?;

    Ok(acquired.0.then_some(SyncLock { conn: Some(conn) }))
}

impl SyncLock {
    pub async fn release(mut self) -> anyhow::Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(SYNC_LOCK_KEY)
            .execute(&mut *conn)
            .await;

        if let Err(err) = unlocked {
            // The session may still hold the lock; never hand it back to the pool.
            drop(conn.detach());
            return Err(anyhow::Error::new(err)
                .context(format!("failed to release advisory lock (key={SYNC_LOCK_KEY})")));
        }
        Ok(())
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        // Unreleased: close the session instead of returning a locked connection to the pool.
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}
