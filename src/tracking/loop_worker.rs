use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::models::VisibilityInterval;

use super::source::DetectionSource;
use super::state::VisibilityTracker;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackingEnd {
    FeedEnded,
    Cancelled,
    SourceFailed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingReport {
    pub session_id: String,
    pub frames: u64,
    pub intervals: Vec<VisibilityInterval>,
    pub ended_by: TrackingEnd,
}

/// Frame-synchronous tracking loop.
///
/// Each frame is read from the source and applied to the tracker before the
/// next read starts. The cancel token is checked once per frame. However the
/// loop ends, an interval still open is flushed against the source clock.
pub fn tracking_loop<S>(
    session_id: String,
    mut source: S,
    cancel_token: CancellationToken,
) -> TrackingReport
where
    S: DetectionSource,
{
    let mut tracker = VisibilityTracker::new();
    let mut frames = 0u64;

    let ended_by = loop {
        if cancel_token.is_cancelled() {
            log_info!("tracking loop for session {} cancelled", session_id);
            break TrackingEnd::Cancelled;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log_info!("detection feed ended for session {}", session_id);
                break TrackingEnd::FeedEnded;
            }
            Err(err) => {
                log_error!("detection read failed for session {}: {err:?}", session_id);
                break TrackingEnd::SourceFailed(format!("{err:#}"));
            }
        };

        frames += 1;
        if let Some(interval) = tracker.observe(&frame.snapshot()) {
            log::debug!(
                "marker {} visible for {}ms",
                interval.marker_id,
                interval.duration().num_milliseconds()
            );
        }
    };

    if let Some(interval) = tracker.finish(source.now()) {
        log_info!(
            "closed open interval for marker {} at teardown",
            interval.marker_id
        );
    }

    let intervals = tracker.into_intervals();
    log_info!(
        "tracking loop processed {} frames, {} intervals for session {}",
        frames,
        intervals.len(),
        session_id
    );

    TrackingReport {
        session_id,
        frames,
        intervals,
        ended_by,
    }
}
