use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyst rating change as published by the feed.
///
/// `ticker` is the persisted identity: a later event for the same ticker replaces the stored one.
/// Targets and ratings are kept verbatim because the feed does not guarantee their format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub ticker: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub target_from: String,
    #[serde(default)]
    pub target_to: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub brokerage: String,
    #[serde(default)]
    pub rating_from: String,
    #[serde(default)]
    pub rating_to: String,
    pub time: DateTime<Utc>,
}

impl RatingEvent {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.ticker.trim().is_empty(), "ticker must be non-empty");
        Ok(())
    }
}
