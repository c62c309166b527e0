use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use ratingscope_core::domain::rating::RatingEvent;
use ratingscope_core::domain::recommendation::RecommendationResponse;
use ratingscope_core::recommend::RecommendationService;
use ratingscope_core::storage::query::total_pages;
use ratingscope_core::storage::RatingEventStore;
use ratingscope_core::sync::{SyncService, SyncTrigger};

use crate::params::StockListParams;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Services are `None` when the API booted without a database.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn RatingEventStore>>,
    pub recommendations: Option<RecommendationService>,
    pub sync: Option<Arc<SyncService>>,
    pub feed_configured: bool,
}

impl AppState {
    pub fn degraded(feed_configured: bool) -> Self {
        Self {
            store: None,
            recommendations: None,
            sync: None,
            feed_configured,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .route("/api/v1/stocks", get(list_stocks))
        .route("/api/v1/stocks/:ticker", get(get_stock))
        .route("/api/v1/sync", post(trigger_sync))
        .route("/api/v1/recommendations", get(get_recommendations))
        .with_state(state)
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    let detail = format!("{err:#}");
    tracing::error!(error = %detail, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Debug, Serialize)]
struct DetailedHealth {
    status: &'static str,
    components: BTreeMap<&'static str, String>,
    api_credentials_configured: bool,
    timestamp: DateTime<Utc>,
    version: &'static str,
}

async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealth> {
    let mut components = BTreeMap::new();
    let mut healthy = true;

    let database = match &state.store {
        None => {
            healthy = false;
            "unavailable".to_string()
        }
        Some(store) => match tokio::time::timeout(PING_TIMEOUT, store.ping()).await {
            Ok(Ok(())) => "ok".to_string(),
            Ok(Err(err)) => {
                healthy = false;
                format!("error: {err:#}")
            }
            Err(_) => {
                healthy = false;
                "error: ping timed out".to_string()
            }
        },
    };
    components.insert("database", database);

    let feed = if state.feed_configured {
        "configured"
    } else {
        healthy = false;
        "missing credentials"
    };
    components.insert("feed", feed.to_string());

    Json(DetailedHealth {
        status: if healthy { "ok" } else { "degraded" },
        components,
        api_credentials_configured: state.feed_configured,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct StockListResponse {
    stocks: Vec<RatingEvent>,
    total_stocks: i64,
    total_pages: i64,
    current_page: i64,
    items_per_page: i64,
}

async fn list_stocks(
    State(state): State<AppState>,
    Query(params): Query<StockListParams>,
) -> Result<Json<StockListResponse>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let (query, pagination) = params.list_query();
    let stocks = store.list(&query).await.map_err(internal_error)?;
    let total = store.count(&query.filter).await.map_err(internal_error)?;

    Ok(Json(StockListResponse {
        stocks,
        total_stocks: total,
        total_pages: total_pages(total, pagination.limit),
        current_page: pagination.page,
        items_per_page: pagination.limit,
    }))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<RatingEvent>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let event = store
        .find_by_ticker(ticker)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(event))
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<Uuid>,
}

async fn trigger_sync(State(state): State<AppState>) -> (StatusCode, Json<SyncResponse>) {
    let Some(sync) = &state.sync else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SyncResponse {
                status: "error",
                message: "database unavailable".to_string(),
                run_id: None,
            }),
        );
    };

    match sync.trigger() {
        Ok(SyncTrigger::Started { run_id }) => (
            StatusCode::ACCEPTED,
            Json(SyncResponse {
                status: "accepted",
                message: "sync started; this may take several minutes".to_string(),
                run_id: Some(run_id),
            }),
        ),
        Ok(SyncTrigger::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(SyncResponse {
                status: "already_running",
                message: "a sync is already in progress".to_string(),
                run_id: None,
            }),
        ),
        Err(err) => {
            tracing::error!(error = %err, "sync rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncResponse {
                    status: "error",
                    message: err.to_string(),
                    run_id: None,
                }),
            )
        }
    }
}

async fn get_recommendations(
    State(state): State<AppState>,
) -> Result<Json<RecommendationResponse>, StatusCode> {
    let Some(service) = &state.recommendations else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let response = service
        .get_recommendations()
        .await
        .map_err(internal_error)?;
    Ok(Json(response))
}
