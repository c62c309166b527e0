use crate::domain::rating::RatingEvent;
use crate::storage::query::{ListQuery, RatingFilter};
use crate::storage::{validate_batch, RatingEventStore, SyncRun};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Process-local store with the same keying and ordering as the Postgres store (text columns
/// compare byte-wise in both).
#[derive(Debug, Default)]
pub struct MemoryRatingStore {
    events: Mutex<BTreeMap<String, RatingEvent>>,
    runs: Mutex<Vec<SyncRun>>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sync_runs(&self) -> Vec<SyncRun> {
        self.runs.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn snapshot(&self) -> anyhow::Result<Vec<RatingEvent>> {
        let guard = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.values().cloned().collect())
    }
}

#[async_trait::async_trait]
impl RatingEventStore for MemoryRatingStore {
    async fn save_all(&self, events: &[RatingEvent]) -> anyhow::Result<u64> {
        validate_batch(events)?;

        let mut guard = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;

        // Stage on a copy and swap, so a failed batch leaves nothing behind.
        let mut staged = guard.clone();
        for event in events {
            staged.insert(event.ticker.clone(), event.clone());
        }
        *guard = staged;
        Ok(events.len() as u64)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RatingEvent>> {
        let mut out: Vec<_> = self
            .snapshot()?
            .into_iter()
            .filter(|e| e.time >= start && e.time <= end)
            .collect();
        out.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| a.ticker.cmp(&b.ticker)));
        Ok(out)
    }

    async fn find_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<RatingEvent>> {
        let guard = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(ticker).cloned())
    }

    async fn list(&self, query: &ListQuery) -> anyhow::Result<Vec<RatingEvent>> {
        let mut out: Vec<_> = self
            .snapshot()?
            .into_iter()
            .filter(|e| query.filter.matches(e))
            .collect();
        out.sort_by(|a, b| query.compare(a, b));

        let offset = usize::try_from(query.offset.max(0)).context("offset out of range")?;
        let limit = usize::try_from(query.limit.max(0)).context("limit out of range")?;
        Ok(out.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &RatingFilter) -> anyhow::Result<i64> {
        let n = self.snapshot()?.iter().filter(|e| filter.matches(e)).count();
        Ok(n as i64)
    }

    async fn record_sync_run(&self, run: &SyncRun) -> anyhow::Result<()> {
        self.runs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?
            .push(run.clone());
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::fetch_all::testing::event;
    use crate::storage::query::{SortField, SortOrder};
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
    }

    fn sample() -> Vec<RatingEvent> {
        let specs = [
            ("AAPL", "Acme", "Hold", "Buy", 3),
            ("AMZN", "Borealis", "Buy", "Buy", 5),
            ("MSFT", "Acme", "Sell", "Hold", 1),
            ("NVDA", "Crestline", "Buy", "Strong-Buy", 9),
            ("TSLA", "Borealis", "Hold", "Sell", 7),
            ("ZBRA", "Acme", "Buy", "Hold", 2),
            ("ABNB", "Crestline", "Neutral", "Buy", 4),
        ];
        specs
            .iter()
            .map(|(t, b, from, to, day)| {
                let mut e = event(t);
                e.brokerage = b.to_string();
                e.rating_from = from.to_string();
                e.rating_to = to.to_string();
                e.time = at(*day);
                e
            })
            .collect()
    }

    #[tokio::test]
    async fn same_event_twice_is_one_record() {
        let store = MemoryRatingStore::new();
        let ev = event("XYZ");
        store.save_all(&[ev.clone()]).await.unwrap();
        store.save_all(&[ev.clone()]).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_ticker("XYZ").await.unwrap(), Some(ev));
    }

    #[tokio::test]
    async fn later_event_replaces_prior_record_entirely() {
        let store = MemoryRatingStore::new();
        let mut first = event("XYZ");
        first.rating_from = "Hold".to_string();
        first.rating_to = "Buy".to_string();
        store.save_all(&[first]).await.unwrap();

        let mut second = event("XYZ");
        second.rating_from = "Buy".to_string();
        second.rating_to = "Sell".to_string();
        second.company = String::new();
        store.save_all(&[second.clone()]).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.find_by_ticker("XYZ").await.unwrap().unwrap();
        assert_eq!(stored.rating_to, "Sell");
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn failing_batch_leaves_prior_state() {
        let store = MemoryRatingStore::new();
        store.save_all(&[event("AAA")]).await.unwrap();
        let before = store.find_by_ticker("AAA").await.unwrap();

        let mut changed = event("AAA");
        changed.rating_to = "Sell".to_string();
        let mut broken = event("BBB");
        broken.ticker = " ".to_string();

        let err = store
            .save_all(&[changed, event("CCC"), broken])
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("index 2"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_ticker("AAA").await.unwrap(), before);
        assert_eq!(store.find_by_ticker("CCC").await.unwrap(), None);
    }

    #[tokio::test]
    async fn window_is_inclusive_and_newest_first() {
        let store = MemoryRatingStore::new();
        store.save_all(&sample()).await.unwrap();

        let got = store.events_between(at(3), at(7)).await.unwrap();
        let tickers: Vec<_> = got.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["TSLA", "AMZN", "ABNB", "AAPL"]);

        let empty = store
            .events_between(at(20), at(20) + Duration::days(30))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn unknown_ticker_is_not_found() {
        let store = MemoryRatingStore::new();
        store.save_all(&sample()).await.unwrap();
        assert_eq!(store.find_by_ticker("NOPE").await.unwrap(), None);
        // Exact lookup, not substring.
        assert_eq!(store.find_by_ticker("AAP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn count_matches_exhaustive_pagination() {
        let store = MemoryRatingStore::new();
        store.save_all(&sample()).await.unwrap();

        let filters = [
            RatingFilter::All,
            RatingFilter::Brokerage("Acme".to_string()),
            RatingFilter::TickerContains("a".to_string()),
            RatingFilter::Rating("Buy".to_string()),
            RatingFilter::Rating("Nothing".to_string()),
        ];

        for filter in filters {
            let total = store.count(&filter).await.unwrap();
            for limit in 1..=4 {
                let mut seen = Vec::new();
                let mut offset = 0;
                loop {
                    let page = store
                        .list(&ListQuery {
                            filter: filter.clone(),
                            offset,
                            limit,
                            ..ListQuery::default()
                        })
                        .await
                        .unwrap();
                    if page.is_empty() {
                        break;
                    }
                    seen.extend(page.into_iter().map(|e| e.ticker));
                    offset += limit;
                }
                assert_eq!(seen.len() as i64, total, "filter={filter:?} limit={limit}");
                seen.sort();
                seen.dedup();
                assert_eq!(seen.len() as i64, total, "pages overlap for {filter:?}");
            }
        }
    }

    #[tokio::test]
    async fn lists_by_requested_sort_with_time_default() {
        let store = MemoryRatingStore::new();
        store.save_all(&sample()).await.unwrap();

        let by_time = store.list(&ListQuery::default()).await.unwrap();
        assert_eq!(by_time[0].ticker, "NVDA");

        let by_ticker = store
            .list(&ListQuery {
                sort: SortField::Ticker,
                order: SortOrder::Asc,
                limit: 3,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        let tickers: Vec<_> = by_ticker.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "ABNB", "AMZN"]);

        let rated = store
            .list(&ListQuery {
                filter: RatingFilter::Rating("Hold".to_string()),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        let tickers: Vec<_> = rated.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["TSLA", "AAPL", "ZBRA", "MSFT"]);
    }

    #[tokio::test]
    async fn text_sort_is_byte_wise() {
        let store = MemoryRatingStore::new();
        let mut events = Vec::new();
        for (ticker, company) in [("LOW", "acme"), ("UP", "Zeta"), ("MID", "Beta")] {
            let mut e = event(ticker);
            e.company = company.to_string();
            events.push(e);
        }
        store.save_all(&events).await.unwrap();

        let got = store
            .list(&ListQuery {
                sort: SortField::Company,
                order: SortOrder::Asc,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        let companies: Vec<_> = got.iter().map(|e| e.company.as_str()).collect();
        // Uppercase sorts before lowercase, as under `COLLATE "C"`.
        assert_eq!(companies, vec!["Beta", "Zeta", "acme"]);
    }
}
