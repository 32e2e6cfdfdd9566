//! Domain error types.
//!
//! Orchestration code keeps using `anyhow`; these variants are what callers
//! downcast to when they need to tell a re-promptable input problem apart
//! from a fatal data problem.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::MarkerId;

#[derive(Error, Debug)]
pub enum ExperimentError {
    /// Invalid generator or session configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A ground-truth or leak reference file does not exist for the trial.
    #[error("missing {kind} reference at {}", path.display())]
    MissingReference { kind: &'static str, path: PathBuf },

    /// The operator left something unselected; re-prompt instead of scoring.
    #[error("incomplete submission: {}", missing.join(", "))]
    IncompleteSubmission { missing: Vec<String> },

    /// Submission and ground truth disagree on the marker universe.
    #[error(
        "marker universe mismatch: not in ground truth {not_in_ground_truth:?}, not in submission {not_in_submission:?}"
    )]
    DataIntegrity {
        not_in_ground_truth: Vec<MarkerId>,
        not_in_submission: Vec<MarkerId>,
    },

    /// A reference record did not follow its schema.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
