//! Reference files and the submission log.
//!
//! Ground truth is written once per trial and read back at scoring time; the
//! leak fact comes from a separate file produced outside this crate.

mod csv_store;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ColorAssignment, GroundTruth, LeakGroundTruth, Submission, TrialKey};
use crate::scoring::ScoreResult;

pub use csv_store::CsvStore;

pub trait ReferenceStore: Send + Sync {
    fn save_assignment(&self, key: &TrialKey, assignment: &ColorAssignment) -> Result<PathBuf>;

    fn load_assignment(&self, key: &TrialKey) -> Result<ColorAssignment>;

    fn save_leak(&self, key: &TrialKey, leak: LeakGroundTruth) -> Result<PathBuf>;

    fn load_leak(&self, key: &TrialKey) -> Result<LeakGroundTruth>;

    /// Both references are required; either one missing fails the lookup.
    fn load_ground_truth(&self, key: &TrialKey) -> Result<GroundTruth> {
        Ok(GroundTruth {
            colors: self.load_assignment(key)?,
            leak: self.load_leak(key)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedSubmission {
    pub recorded_at: DateTime<Utc>,
    pub submission: Submission,
    pub score: ScoreResult,
}

pub trait SubmissionLog: Send + Sync {
    /// Appends one row to the session's log, creating it with a header first.
    fn append(&self, session_id: &str, entry: &LoggedSubmission) -> Result<PathBuf>;
}
