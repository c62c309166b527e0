use crate::domain::rating::RatingEvent;
use crate::feed::{FeedClient, FeedError};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_MAX_PAGES: usize = 10_000;
const DEFAULT_DEADLINE_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Additional attempts per page after the first failure.
    pub max_retries: u32,

    /// Fixed delay between attempts of the same page.
    pub retry_delay: Duration,

    /// Upper bound on pages followed in one run.
    pub max_pages: usize,

    /// Overall budget for the run; no new page request is issued once it elapses.
    pub deadline: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_pages: DEFAULT_MAX_PAGES,
            deadline: Some(Duration::from_secs(DEFAULT_DEADLINE_SECS)),
        }
    }
}

impl FetchOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("FEED_MAX_RETRIES") {
            if let Ok(n) = s.parse::<u32>() {
                out.max_retries = n;
            }
        }

        if let Ok(s) = std::env::var("FEED_RETRY_DELAY_MS") {
            if let Ok(n) = s.parse::<u64>() {
                out.retry_delay = Duration::from_millis(n);
            }
        }

        if let Ok(s) = std::env::var("FEED_MAX_PAGES") {
            if let Ok(n) = s.parse::<usize>() {
                out.max_pages = n.max(1);
            }
        }

        if let Ok(s) = std::env::var("SYNC_DEADLINE_SECS") {
            if let Ok(n) = s.parse::<u64>() {
                // 0 disables the deadline.
                out.deadline = (n > 0).then(|| Duration::from_secs(n));
            }
        }

        out
    }
}

/// Follows the feed cursor from the first page to the last and returns every event in feed order.
///
/// A failed page is retried in place up to `max_retries` times; a successful page resets the
/// budget. The run is all-or-nothing: any terminal error discards what was accumulated.
pub async fn fetch_all(
    client: &dyn FeedClient,
    opts: &FetchOptions,
) -> Result<Vec<RatingEvent>, FeedError> {
    client.ensure_configured()?;

    let started = Instant::now();
    let deadline = opts.deadline.map(|d| started + d);

    let mut events = Vec::new();
    let mut cursor = String::new();
    let mut pages: usize = 0;
    let mut retries: u32 = 0;

    loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                tracing::error!(pages, items = events.len(), "feed sync deadline exceeded");
                return Err(FeedError::DeadlineExceeded {
                    elapsed: started.elapsed(),
                });
            }
        }

        let page = match client.fetch_page(&cursor).await {
            Ok(page) => page,
            Err(err) if !err.is_retryable() => {
                tracing::error!(
                    feed = client.feed_name(),
                    pages,
                    %cursor,
                    error = %err,
                    "feed fetch failed permanently; aborting"
                );
                return Err(err);
            }
            Err(err) => {
                retries += 1;
                if retries > opts.max_retries {
                    tracing::error!(
                        feed = client.feed_name(),
                        pages,
                        %cursor,
                        retries = opts.max_retries,
                        error = %err,
                        "feed retry budget exhausted; aborting"
                    );
                    return Err(err);
                }
                tracing::warn!(
                    attempt = retries,
                    delay = ?opts.retry_delay,
                    %cursor,
                    error = %err,
                    "feed page fetch failed; retrying"
                );
                tokio::time::sleep(opts.retry_delay).await;
                continue;
            }
        };

        retries = 0;
        pages += 1;
        events.extend(page.items);

        tracing::debug!(pages, items = events.len(), next_page = %page.next_page, "feed page fetched");

        if page.next_page.is_empty() {
            break;
        }
        if pages >= opts.max_pages {
            tracing::error!(max_pages = opts.max_pages, "feed page ceiling reached; aborting");
            return Err(FeedError::PageLimitExceeded {
                max_pages: opts.max_pages,
            });
        }
        cursor = page.next_page;
    }

    tracing::info!(
        feed = client.feed_name(),
        pages,
        items = events.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "feed fetch completed"
    );
    Ok(events)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn tickers(events: &[RatingEvent]) -> Vec<&str> {
        events.iter().map(|e| e.ticker.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn follows_cursor_until_empty() {
        let feed = ScriptedFeed::new(vec![page(&["AAA", "BBB"], "p2"), page(&["CCC"], "")]);

        let events = fetch_all(&feed, &FetchOptions::default()).await.unwrap();
        assert_eq!(tickers(&events), vec!["AAA", "BBB", "CCC"]);
        assert_eq!(feed.calls(), vec!["", "p2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_is_transparent_within_budget() {
        for failures in 0..=3 {
            let mut script = vec![page(&["AAA", "BBB"], "p2")];
            script.extend((0..failures).map(|_| transient()));
            script.push(page(&["CCC"], ""));
            let feed = ScriptedFeed::new(script);

            let events = fetch_all(&feed, &FetchOptions::default()).await.unwrap();
            assert_eq!(tickers(&events), vec!["AAA", "BBB", "CCC"], "failures={failures}");

            // Retries hit the same page.
            let calls = feed.calls();
            assert_eq!(calls.len(), 2 + failures);
            assert!(calls[1..].iter().all(|c| c == "p2"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        let feed = ScriptedFeed::new(vec![transient(), transient(), page(&["AAA"], "")]);
        let started = Instant::now();

        fetch_all(&feed, &FetchOptions::default()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_page_resets_retry_budget() {
        let feed = ScriptedFeed::new(vec![
            transient(),
            transient(),
            transient(),
            page(&["AAA"], "p2"),
            transient(),
            transient(),
            transient(),
            page(&["BBB"], ""),
        ]);

        let events = fetch_all(&feed, &FetchOptions::default()).await.unwrap();
        assert_eq!(tickers(&events), vec!["AAA", "BBB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_returns_last_error_and_discards_pages() {
        let feed = ScriptedFeed::new(vec![
            page(&["AAA"], "p2"),
            transient(),
            transient(),
            transient(),
            transient(),
        ]);

        let err = fetch_all(&feed, &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, FeedError::Status { .. }));
        // First attempt plus three retries on p2.
        assert_eq!(feed.calls().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn gone_aborts_without_retry_or_further_pages() {
        let feed = ScriptedFeed::new(vec![
            page(&["AAA"], "p2"),
            gone(),
            page(&["CCC"], ""),
        ]);

        let err = fetch_all(&feed, &FetchOptions::default()).await.unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(feed.calls(), vec!["", "p2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_fails_before_fetching() {
        let mut feed = ScriptedFeed::new(vec![page(&["AAA"], "")]);
        feed.configured = false;

        let err = fetch_all(&feed, &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, FeedError::MissingCredential));
        assert!(feed.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn page_ceiling_bounds_a_looping_feed() {
        let feed = ScriptedFeed::new(vec![
            page(&["AAA"], "p2"),
            page(&["BBB"], "p3"),
            page(&["CCC"], "p4"),
        ]);
        let opts = FetchOptions {
            max_pages: 2,
            ..FetchOptions::default()
        };

        let err = fetch_all(&feed, &opts).await.unwrap_err();
        assert!(matches!(err, FeedError::PageLimitExceeded { max_pages: 2 }));
        assert_eq!(feed.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_new_requests() {
        // Script is empty: every call fails transiently.
        let feed = ScriptedFeed::new(Vec::new());
        let opts = FetchOptions {
            max_retries: 100,
            retry_delay: Duration::from_secs(2),
            max_pages: 10,
            deadline: Some(Duration::from_secs(5)),
        };

        let err = fetch_all(&feed, &opts).await.unwrap_err();
        assert!(matches!(err, FeedError::DeadlineExceeded { .. }));
        // Attempts at t=0s, 2s and 4s; the check at 6s stops the run.
        assert_eq!(feed.calls().len(), 3);
    }
}
