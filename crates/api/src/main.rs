use std::sync::Arc;

use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratingscope_core::config::{mask_secret, Settings};
use ratingscope_core::feed::{FetchOptions, HttpFeedClient};
use ratingscope_core::recommend::{RecommendationEngine, RecommendationService, ScoringWeights};
use ratingscope_core::storage::{PgRatingStore, RatingEventStore};
use ratingscope_core::sync::{SyncService, SyncTrigger};

mod params;
mod routes;

use routes::AppState;

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

    tracing::info!(
        feed = %settings.feed_base_url,
        token = %mask_secret(&settings.feed_auth_token),
        "feed configuration loaded"
    );

    let pool = connect_database(&settings).await;
    let state = match pool {
        Some(pool) => build_state(&settings, pool)?,
        None => AppState::degraded(settings.feed_credentials_configured()),
    };

    if settings.sync_on_startup {
        startup_sync(&state);
    }

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn connect_database(settings: &Settings) -> Option<PgPool> {
    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url())
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            return None;
        }
    };

    match ratingscope_core::storage::migrate(&pool).await {
        Ok(()) => Some(pool),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
            None
        }
    }
}

fn build_state(settings: &Settings, pool: PgPool) -> anyhow::Result<AppState> {
    let store: Arc<dyn RatingEventStore> = Arc::new(PgRatingStore::new(pool));
    let feed = Arc::new(HttpFeedClient::from_settings(settings)?);

    let recommendations = RecommendationService::new(
        Arc::clone(&store),
        RecommendationEngine::new(ScoringWeights::from_env()),
    );
    let sync = SyncService::new(feed, Arc::clone(&store), FetchOptions::from_env());
    let feed_configured = sync.feed_configured();

    Ok(AppState {
        store: Some(store),
        recommendations: Some(recommendations),
        sync: Some(Arc::new(sync)),
        feed_configured,
    })
}

fn startup_sync(state: &AppState) {
    let Some(sync) = &state.sync else {
        tracing::warn!("SYNC_ON_STARTUP set but database is unavailable; skipping");
        return;
    };
    match sync.trigger() {
        Ok(SyncTrigger::Started { run_id }) => tracing::info!(%run_id, "startup sync started"),
        Ok(SyncTrigger::AlreadyRunning) => {}
        Err(err) => tracing::warn!(error = %err, "startup sync skipped"),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
