use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub rank: i32,
    pub ticker: String,
    pub company: String,
    pub score: f64,
    /// Ordinal rating movement (`scale(to) - scale(from)`).
    pub rating_delta: i32,
    /// Fractional target price change, when both targets parse.
    pub target_change: Option<f64>,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    pub target_from: String,
    pub target_to: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendationResult>,
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub message: String,
}
