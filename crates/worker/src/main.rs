use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use ratingscope_core::config::Settings;
use ratingscope_core::feed::{FeedClient, FetchOptions, HttpFeedClient};
use ratingscope_core::recommend::{RecommendationEngine, RecommendationService, ScoringWeights};
use ratingscope_core::storage::{lock, MemoryRatingStore, PgRatingStore, RatingEventStore};
use ratingscope_core::sync::SyncService;

#[derive(Debug, Parser)]
#[command(name = "ratingscope_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the whole rating feed and upsert it into the database.
    Sync {
        /// Fetch into memory only; the database is never touched.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the current top recommendations as JSON.
    Recommend,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Sync { dry_run } => run_sync(&settings, dry_run).await,
        Command::Recommend => run_recommend(&settings).await,
    };
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run_sync(settings: &Settings, dry_run: bool) -> anyhow::Result<()> {
    let feed = Arc::new(HttpFeedClient::from_settings(settings)?);
    feed.ensure_configured()?;
    let options = FetchOptions::from_env();

    if dry_run {
        let store = Arc::new(MemoryRatingStore::new());
        let sync = SyncService::new(feed, store.clone(), options);
        let report = sync.run_once(Uuid::new_v4()).await?;
        tracing::info!(
            dry_run = true,
            fetched = report.fetched,
            distinct_tickers = store.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "sync finished (dry-run)"
        );
        return Ok(());
    }

    let pool = connect(settings).await?;

    let Some(sync_lock) = lock::try_acquire_sync_lock(&pool).await? else {
        tracing::warn!("sync lock not acquired; another sync is in progress");
        return Ok(());
    };

    let store: Arc<dyn RatingEventStore> = Arc::new(PgRatingStore::new(pool));
    let sync = SyncService::new(feed, store, options);
    let report = sync.run_and_record(Uuid::new_v4()).await;

    if let Err(err) = sync_lock.release().await {
        tracing::warn!(error = %err, "failed to release sync lock");
    }

    match report {
        Some(_) => Ok(()),
        None => anyhow::bail!("sync failed; see logs for details"),
    }
}

async fn run_recommend(settings: &Settings) -> anyhow::Result<()> {
    let pool = connect(settings).await?;
    let store: Arc<dyn RatingEventStore> = Arc::new(PgRatingStore::new(pool));
    let service = RecommendationService::new(
        store,
        RecommendationEngine::new(ScoringWeights::from_env()),
    );

    let response = service.get_recommendations().await?;
    let json = serde_json::to_string_pretty(&response)
        .context("failed to serialize recommendations")?;
    println!("{json}");
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url())
        .await
        .context("database connect failed")?;

    ratingscope_core::storage::migrate(&pool).await?;
    Ok(pool)
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
