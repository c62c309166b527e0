use crate::domain::rating::RatingEvent;
use crate::domain::recommendation::RecommendationResult;
use crate::recommend::scoring::{ScoringWeights, Signals};
use std::cmp::Ordering;

/// Pure scorer and ranker over rating events. No I/O, never mutates its input.
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    weights: ScoringWeights,
}

impl RecommendationEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Scores every event and returns the best `limit`, ranked from 1.
    ///
    /// Ties are broken by newer `time`, then `ticker`, then the remaining fields, so the result
    /// does not depend on input order. Duplicate tickers are scored independently.
    pub fn rank(&self, events: &[RatingEvent], limit: i64) -> Vec<RecommendationResult> {
        let Ok(limit) = usize::try_from(limit) else {
            return Vec::new();
        };
        if limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, Signals, &RatingEvent)> = events
            .iter()
            .map(|e| {
                let signals = Signals::of(e);
                (signals.score(&self.weights), signals, e)
            })
            .collect();

        scored.sort_by(|a, b| compare_scored(a.0, a.2, b.0, b.2));
        scored.truncate(limit);

        scored
            .into_iter()
            .enumerate()
            .map(|(idx, (score, signals, e))| RecommendationResult {
                rank: i32::try_from(idx + 1).unwrap_or(i32::MAX),
                ticker: e.ticker.clone(),
                company: e.company.clone(),
                score,
                rating_delta: signals.rating_delta,
                target_change: signals.target_change,
                action: e.action.clone(),
                brokerage: e.brokerage.clone(),
                rating_from: e.rating_from.clone(),
                rating_to: e.rating_to.clone(),
                target_from: e.target_from.clone(),
                target_to: e.target_to.clone(),
                time: e.time,
            })
            .collect()
    }
}

fn compare_scored(sa: f64, a: &RatingEvent, sb: f64, b: &RatingEvent) -> Ordering {
    sb.total_cmp(&sa)
        .then_with(|| b.time.cmp(&a.time))
        .then_with(|| a.ticker.cmp(&b.ticker))
        .then_with(|| a.brokerage.cmp(&b.brokerage))
        .then_with(|| a.action.cmp(&b.action))
        .then_with(|| a.company.cmp(&b.company))
        .then_with(|| a.rating_from.cmp(&b.rating_from))
        .then_with(|| a.rating_to.cmp(&b.rating_to))
        .then_with(|| a.target_from.cmp(&b.target_from))
        .then_with(|| a.target_to.cmp(&b.target_to))
}
