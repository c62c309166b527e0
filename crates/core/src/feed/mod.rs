pub mod error;
pub mod fetch_all;
pub mod http;

pub use error::FeedError;
pub use fetch_all::{fetch_all, FetchOptions};
pub use http::HttpFeedClient;

use crate::domain::rating::RatingEvent;
use serde::{Deserialize, Serialize};

/// One page of the rating-change feed. An empty `next_page` marks the last page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<RatingEvent>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub next_page: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait::async_trait]
pub trait FeedClient: Send + Sync {
    fn feed_name(&self) -> &'static str;

    /// Fails fast when the client cannot make authenticated requests at all.
    fn ensure_configured(&self) -> Result<(), FeedError> {
        Ok(())
    }

    /// Fetches the page identified by `cursor`; an empty cursor requests the first page.
    async fn fetch_page(&self, cursor: &str) -> Result<FeedPage, FeedError>;
}
