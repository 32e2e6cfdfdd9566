use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{tracking_loop, TrackingReport};
use super::source::DetectionSource;

/// Owns the background tracking loop for at most one session at a time.
pub struct TrackingController {
    handle: Option<JoinHandle<TrackingReport>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for TrackingController {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Starts the loop on a blocking thread; the detector read is the only
    /// place it waits.
    pub fn start_tracking<S>(&mut self, session_id: String, source: S) -> Result<CancellationToken>
    where
        S: DetectionSource + 'static,
    {
        if self.handle.is_some() {
            bail!("tracking already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        info!("starting tracking loop for session {session_id}");
        let handle =
            tokio::task::spawn_blocking(move || tracking_loop(session_id, source, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token.clone());
        Ok(cancel_token)
    }

    /// Hands out the loop's join handle. The cancel token stays here, so
    /// `stop_tracking` can still end a loop someone else is awaiting.
    pub fn detach(&mut self) -> Result<JoinHandle<TrackingReport>> {
        self.handle
            .take()
            .ok_or_else(|| anyhow!("tracking is not active"))
    }

    /// Waits for the feed to end on its own.
    pub async fn wait(&mut self) -> Result<TrackingReport> {
        let handle = self.detach()?;
        self.cancel_token = None;
        handle.await.context("tracking loop task failed to join")
    }

    /// Signals cancellation and waits for the loop to flush and exit.
    /// Returns `None` when no loop runs or a detached waiter owns the report.
    pub async fn stop_tracking(&mut self) -> Result<Option<TrackingReport>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => handle
                .await
                .context("tracking loop task failed to join")
                .map(Some),
            None => Ok(None),
        }
    }
}
