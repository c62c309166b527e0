use crate::domain::recommendation::RecommendationResponse;
use crate::recommend::engine::RecommendationEngine;
use crate::storage::RatingEventStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const WINDOW_DAYS: i64 = 30;
pub const RECOMMENDATION_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn RatingEventStore>,
    engine: RecommendationEngine,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn RatingEventStore>, engine: RecommendationEngine) -> Self {
        Self { store, engine }
    }

    /// Ranks the events of the last 30 days ending now.
    pub async fn get_recommendations(&self) -> anyhow::Result<RecommendationResponse> {
        self.recommendations_at(Utc::now()).await
    }

    pub async fn recommendations_at(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RecommendationResponse> {
        let start = now - Duration::days(WINDOW_DAYS);
        let events = self.store.events_between(start, now).await?;

        let recommendations = self.engine.rank(&events, RECOMMENDATION_LIMIT);
        let count = recommendations.len();

        tracing::debug!(window_events = events.len(), count, "recommendations generated");

        Ok(RecommendationResponse {
            recommendations,
            generated_at: Utc::now(),
            count,
            message: summary_message(count),
        })
    }
}

fn summary_message(count: usize) -> String {
    match count {
        0 => "No recommendations found for the last 30 days. Try again after the next sync."
            .to_string(),
        1 => "Found 1 investment recommendation.".to_string(),
        n => format!("Found {n} investment recommendations."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rating::RatingEvent;
    use crate::feed::fetch_all::testing::event;
    use crate::storage::{ListQuery, MemoryRatingStore, RatingFilter, SyncRun};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    }

    fn service(store: Arc<MemoryRatingStore>) -> RecommendationService {
        RecommendationService::new(store, RecommendationEngine::default())
    }

    fn aged(ticker: &str, days_ago: i64) -> RatingEvent {
        let mut e = event(ticker);
        e.time = now() - Duration::days(days_ago);
        e
    }

    #[tokio::test]
    async fn empty_window_is_not_an_error() {
        let store = Arc::new(MemoryRatingStore::new());
        store.save_all(&[aged("OLD", 45)]).await.unwrap();

        let resp = service(store).recommendations_at(now()).await.unwrap();
        assert_eq!(resp.count, 0);
        assert!(resp.recommendations.is_empty());
        assert!(resp.message.starts_with("No recommendations"));
    }

    #[tokio::test]
    async fn ranks_only_events_inside_window_and_caps_at_ten() {
        let store = Arc::new(MemoryRatingStore::new());
        let mut events: Vec<_> = (0..12).map(|i| aged(&format!("T{i:02}"), i)).collect();
        events.push(aged("EDGE", WINDOW_DAYS));
        events.push(aged("STALE", WINDOW_DAYS + 1));
        store.save_all(&events).await.unwrap();

        let resp = service(store).recommendations_at(now()).await.unwrap();
        assert_eq!(resp.count, 10);
        assert_eq!(resp.message, "Found 10 investment recommendations.");
        assert!(resp.recommendations.iter().all(|r| r.ticker != "STALE"));
        // Equal scores: newest first.
        assert_eq!(resp.recommendations[0].ticker, "T00");
    }

    #[tokio::test]
    async fn singular_message_for_one_result() {
        let store = Arc::new(MemoryRatingStore::new());
        store.save_all(&[aged("ONE", 1)]).await.unwrap();

        let resp = service(store).recommendations_at(now()).await.unwrap();
        assert_eq!(resp.count, 1);
        assert_eq!(resp.message, "Found 1 investment recommendation.");
        assert_eq!(resp.recommendations[0].rank, 1);
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl RatingEventStore for FailingStore {
        async fn save_all(&self, _: &[RatingEvent]) -> anyhow::Result<u64> {
            anyhow::bail!("db down")
        }
        async fn events_between(
            &self,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> anyhow::Result<Vec<RatingEvent>> {
            anyhow::bail!("db down")
        }
        async fn find_by_ticker(&self, _: &str) -> anyhow::Result<Option<RatingEvent>> {
            anyhow::bail!("db down")
        }
        async fn list(&self, _: &ListQuery) -> anyhow::Result<Vec<RatingEvent>> {
            anyhow::bail!("db down")
        }
        async fn count(&self, _: &RatingFilter) -> anyhow::Result<i64> {
            anyhow::bail!("db down")
        }
        async fn record_sync_run(&self, _: &SyncRun) -> anyhow::Result<()> {
            anyhow::bail!("db down")
        }
        async fn ping(&self) -> anyhow::Result<()> {
            anyhow::bail!("db down")
        }
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let svc = RecommendationService::new(Arc::new(FailingStore), RecommendationEngine::default());
        let err = svc.recommendations_at(now()).await.unwrap_err();
        assert!(err.to_string().contains("db down"));
    }
}
