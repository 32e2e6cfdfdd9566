use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db::Database,
    ground_truth::{generate_assignment, GeneratorConfig},
    models::{
        ColorAssignment, LeakGroundTruth, MarkerId, SessionRecord, SessionStatus,
        SubmissionDraft, TrialKey,
    },
    scoring::score_submission,
    storage::{LoggedSubmission, ReferenceStore, SubmissionLog},
    tracking::{DetectionSource, TrackingController, TrackingReport},
};

/// Explicit per-session state handed to tracking and scoring in place of
/// process-wide globals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSession {
    pub id: String,
    pub trial_id: String,
    pub universe_size: u32,
    pub started_at: DateTime<Utc>,
    pub assignment: ColorAssignment,
}

impl ExperimentSession {
    pub fn key(&self) -> TrialKey {
        TrialKey::new(self.id.clone(), self.trial_id.clone())
    }

    pub fn universe(&self) -> impl Iterator<Item = MarkerId> {
        0..self.universe_size
    }
}

pub struct SessionController<S> {
    db: Database,
    store: Arc<S>,
    tracking: Arc<Mutex<TrackingController>>,
}

impl<S> Clone for SessionController<S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            store: Arc::clone(&self.store),
            tracking: Arc::clone(&self.tracking),
        }
    }
}

impl<S> SessionController<S>
where
    S: ReferenceStore + SubmissionLog + 'static,
{
    pub fn new(db: Database, store: S) -> Self {
        Self {
            db,
            store: Arc::new(store),
            tracking: Arc::new(Mutex::new(TrackingController::new())),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Marks sessions left running by a crash as interrupted.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let stale = self.db.get_incomplete_sessions().await?;
        let now = Utc::now();
        for session in &stale {
            warn!(
                "Recovered incomplete session {}; marking as Interrupted",
                session.id
            );
            self.db.mark_session_interrupted(&session.id, now).await?;
        }
        Ok(stale.len())
    }

    /// Draws the trial's ground truth, persists it and registers the session.
    pub async fn start_session(
        &self,
        trial_id: &str,
        generator: &GeneratorConfig,
    ) -> Result<ExperimentSession> {
        let mut rng = generator.rng();
        let assignment = generate_assignment(generator, &mut rng)?;

        let started_at = Utc::now();
        let session = ExperimentSession {
            id: Uuid::new_v4().to_string(),
            trial_id: trial_id.trim().to_string(),
            universe_size: generator.universe_size,
            started_at,
            assignment,
        };

        self.store
            .save_assignment(&session.key(), &session.assignment)
            .context("failed to persist ground truth")?;

        self.db
            .insert_session(&SessionRecord {
                id: session.id.clone(),
                trial_id: session.trial_id.clone(),
                universe_size: session.universe_size,
                started_at,
                stopped_at: None,
                status: SessionStatus::Running,
                created_at: started_at,
                updated_at: started_at,
            })
            .await?;

        info!(
            "Started session {} trial {} with {} markers ({} red)",
            session.id,
            session.trial_id,
            session.universe_size,
            session.assignment.alarm_count()
        );
        Ok(session)
    }

    /// Rebuilds a session from its stored record and ground-truth file.
    pub async fn load_session(&self, session_id: &str) -> Result<ExperimentSession> {
        let record = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
        let key = TrialKey::new(record.id.clone(), record.trial_id.clone());
        let assignment = self.store.load_assignment(&key)?;

        Ok(ExperimentSession {
            id: record.id,
            trial_id: record.trial_id,
            universe_size: record.universe_size,
            started_at: record.started_at,
            assignment,
        })
    }

    /// Stores the trial's leak fact. Normally written by the rig operator's
    /// own tooling; exposed here for setups without it.
    pub fn record_leak(&self, key: &TrialKey, leak: LeakGroundTruth) -> Result<()> {
        let path = self.store.save_leak(key, leak)?;
        info!("Recorded leak reference at {}", path.display());
        Ok(())
    }

    /// Starts tracking for the session. The returned token cancels the loop
    /// without going through the controller.
    pub async fn start_tracking<D>(
        &self,
        session: &ExperimentSession,
        source: D,
    ) -> Result<CancellationToken>
    where
        D: DetectionSource + 'static,
    {
        self.tracking
            .lock()
            .await
            .start_tracking(session.id.clone(), source)
    }

    /// Waits for the loop to end, then stores the intervals.
    ///
    /// The tracking lock is released before awaiting, so `stop_tracking` and
    /// `end_session` on a clone still reach the cancel token.
    pub async fn wait_tracking(&self) -> Result<TrackingReport> {
        let handle = self.tracking.lock().await.detach()?;
        let report = handle.await.context("tracking loop task failed to join")?;
        self.persist_report(&report).await?;
        Ok(report)
    }

    /// Cancels the loop and lets it flush. When no task is waiting on it,
    /// the intervals are stored here; otherwise the waiter stores them and
    /// this returns `None`.
    pub async fn stop_tracking(&self) -> Result<Option<TrackingReport>> {
        let report = self.tracking.lock().await.stop_tracking().await?;
        if let Some(report) = &report {
            self.persist_report(report).await?;
        }
        Ok(report)
    }

    async fn persist_report(&self, report: &TrackingReport) -> Result<()> {
        self.db
            .insert_visibility_intervals(&report.session_id, &report.intervals)
            .await
            .with_context(|| {
                format!(
                    "failed to store intervals for session {}",
                    report.session_id
                )
            })?;
        info!(
            "Stored {} visibility intervals for session {}",
            report.intervals.len(),
            report.session_id
        );
        Ok(())
    }

    /// Ends the session, stopping any tracking still running first.
    pub async fn end_session(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        self.stop_tracking().await?;
        let stopped_at = Utc::now();
        self.db
            .mark_session_status(session_id, status, Some(stopped_at), stopped_at)
            .await?;
        info!("Session {} ended as {}", session_id, status.as_str());
        Ok(())
    }

    /// Validates, scores and logs an operator report.
    ///
    /// Missing references and incomplete drafts fail before anything is
    /// scored or written. A known session supplies the trial id when the
    /// draft leaves it blank, and rejects a draft naming another trial.
    pub async fn submit(
        &self,
        session_id: &str,
        mut draft: SubmissionDraft,
    ) -> Result<LoggedSubmission> {
        let record = self.db.get_session(session_id).await?;
        if let Some(record) = &record {
            let declared = draft.trial_id.trim();
            if declared.is_empty() {
                draft.trial_id = record.trial_id.clone();
            } else if declared != record.trial_id {
                bail!(
                    "session {session_id} ran trial {}, not {declared}",
                    record.trial_id
                );
            }
        }

        let key = TrialKey::new(session_id, draft.trial_id.trim());
        let ground_truth = self.store.load_ground_truth(&key)?;

        let universe: Vec<MarkerId> = match &record {
            Some(record) => (0..record.universe_size).collect(),
            None => ground_truth.colors.universe().collect(),
        };
        let submission = draft.validate(universe)?;
        if submission.crack_without_location() {
            warn!(
                "Participant {} reported a crack without a location",
                submission.participant_id
            );
        }

        let score = score_submission(&ground_truth, &submission)?;
        let entry = LoggedSubmission {
            recorded_at: Utc::now(),
            submission,
            score,
        };

        let path = self.store.append(session_id, &entry)?;
        info!(
            "Scored participant {} trial {}: {:.1} (logged to {})",
            entry.submission.participant_id,
            entry.submission.trial_id,
            entry.score.rounded(),
            path.display()
        );
        Ok(entry)
    }
}
