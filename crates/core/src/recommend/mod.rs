pub mod engine;
pub mod scoring;
pub mod service;

pub use engine::RecommendationEngine;
pub use scoring::ScoringWeights;
pub use service::RecommendationService;
