use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::models::{GroundTruth, MarkerId, Submission};
use crate::scoring::config::ScoringWeights;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub leak_points: f64,
    pub crack_points: f64,
    pub marker_points: f64,
    pub total: f64,
}

impl ScoreResult {
    /// Presented value, rounded to one decimal. Components stay unrounded.
    pub fn rounded(&self) -> f64 {
        (self.total * 10.0).round() / 10.0
    }
}

/// Scores a validated submission with the standard weights.
pub fn score_submission(
    ground_truth: &GroundTruth,
    submission: &Submission,
) -> Result<ScoreResult, ExperimentError> {
    score_submission_with(&ScoringWeights::default(), ground_truth, submission)
}

pub fn score_submission_with(
    weights: &ScoringWeights,
    ground_truth: &GroundTruth,
    submission: &Submission,
) -> Result<ScoreResult, ExperimentError> {
    check_universe(ground_truth, submission)?;

    let leak_points = if submission.leak_present == ground_truth.leak.leak_present {
        weights.leak
    } else {
        0.0
    };

    let expected_crack = ground_truth.colors.has_alarm();
    let crack_points = if submission.crack_present == expected_crack {
        weights.crack
    } else {
        0.0
    };

    let all_markers_match = ground_truth
        .colors
        .as_map()
        .iter()
        .all(|(id, color)| submission.marker_colors.get(id) == Some(color));
    let marker_points = if all_markers_match {
        weights.markers
    } else {
        0.0
    };

    Ok(ScoreResult {
        leak_points,
        crack_points,
        marker_points,
        total: leak_points + crack_points + marker_points,
    })
}

/// Both sides must cover the same marker ids. A mismatch means generation and
/// submission disagree on the universe, which is never scored.
fn check_universe(
    ground_truth: &GroundTruth,
    submission: &Submission,
) -> Result<(), ExperimentError> {
    let truth = ground_truth.colors.as_map();

    let not_in_ground_truth: Vec<MarkerId> = submission
        .marker_colors
        .keys()
        .filter(|id| !truth.contains_key(id))
        .copied()
        .collect();
    let not_in_submission: Vec<MarkerId> = truth
        .keys()
        .filter(|id| !submission.marker_colors.contains_key(id))
        .copied()
        .collect();

    if not_in_ground_truth.is_empty() && not_in_submission.is_empty() {
        Ok(())
    } else {
        Err(ExperimentError::DataIntegrity {
            not_in_ground_truth,
            not_in_submission,
        })
    }
}
