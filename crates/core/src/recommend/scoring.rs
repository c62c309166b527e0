use crate::domain::rating::RatingEvent;

/// Position on the ordinal rating scale for ratings outside the known vocabulary.
pub const NEUTRAL_RATING: i32 = 2;

const DEFAULT_RATING_WEIGHT: f64 = 1.0;
const DEFAULT_TARGET_WEIGHT: f64 = 0.5;
const DEFAULT_REITERATION_BASELINE: f64 = 0.25;

/// Calibrated weights for combining the rating and target-price signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Multiplier on the ordinal rating movement. Dominant term.
    pub rating_weight: f64,

    /// Multiplier on the fractional target change (clamped to [-1, 1]).
    pub target_weight: f64,

    /// Rating signal for an unchanged neutral rating; each notch above neutral adds one more
    /// baseline, and a sustained sell-class rating contributes nothing.
    pub reiteration_baseline: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            rating_weight: DEFAULT_RATING_WEIGHT,
            target_weight: DEFAULT_TARGET_WEIGHT,
            reiteration_baseline: DEFAULT_REITERATION_BASELINE,
        }
    }
}

impl ScoringWeights {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(v) = env_f64("SCORING_RATING_WEIGHT") {
            out.rating_weight = v;
        }
        if let Some(v) = env_f64("SCORING_TARGET_WEIGHT") {
            out.target_weight = v;
        }
        if let Some(v) = env_f64("SCORING_REITERATION_BASELINE") {
            out.reiteration_baseline = v;
        }

        out
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Signals extracted from one event, before weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub rating_delta: i32,
    pub reiterated: bool,
    /// Scale position of the new rating.
    pub rating_level: i32,
    pub target_change: Option<f64>,
}

impl Signals {
    pub fn of(event: &RatingEvent) -> Self {
        let from = rating_scale(&event.rating_from);
        let to = rating_scale(&event.rating_to);
        Self {
            rating_delta: to - from,
            reiterated: normalize(&event.rating_from) == normalize(&event.rating_to),
            rating_level: to,
            target_change: target_change(&event.target_from, &event.target_to),
        }
    }

    pub fn score(&self, weights: &ScoringWeights) -> f64 {
        let rating = if self.reiterated {
            let notches_from_sell = (self.rating_level - NEUTRAL_RATING + 1).max(0);
            weights.reiteration_baseline * f64::from(notches_from_sell)
        } else {
            weights.rating_weight * f64::from(self.rating_delta)
        };
        let target = self
            .target_change
            .map(|c| weights.target_weight * c.clamp(-1.0, 1.0))
            .unwrap_or(0.0);
        rating + target
    }
}

/// Maps a free-form analyst rating onto 0 (strong sell) ..= 4 (strong buy).
pub fn rating_scale(rating: &str) -> i32 {
    match normalize(rating).as_str() {
        "strong sell" => 0,
        "sell" | "underperform" | "underweight" | "reduce" | "moderate sell"
        | "sector underperform" | "market underperform" | "negative" => 1,
        "hold" | "neutral" | "market perform" | "sector perform" | "equal weight"
        | "in line" | "peer perform" | "sector weight" | "market weight" | "fair value" => 2,
        "buy" | "outperform" | "overweight" | "accumulate" | "moderate buy"
        | "sector outperform" | "market outperform" | "positive" | "speculative buy"
        | "add" => 3,
        "strong buy" | "top pick" | "conviction buy" => 4,
        _ => NEUTRAL_RATING,
    }
}

fn normalize(rating: &str) -> String {
    rating
        .trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a feed price target such as `"$1,234.50"`.
pub fn parse_price(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `(to - from) / from`, or `None` when either side is unusable.
pub fn target_change(from: &str, to: &str) -> Option<f64> {
    let from = parse_price(from)?;
    let to = parse_price(to)?;
    if from <= 0.0 {
        return None;
    }
    Some((to - from) / from)
}
