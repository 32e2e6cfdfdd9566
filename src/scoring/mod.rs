pub mod config;
pub mod engine;

pub use config::ScoringWeights;
pub use engine::{score_submission, score_submission_with, ScoreResult};
