use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DetectionSnapshot, MarkerId, VisibilityInterval};

/// The tracker holds at most one marker at a time, even when several are
/// visible together. Recorded telemetry depends on this single-slot behavior.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TrackerState {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Tracking {
        marker_id: MarkerId,
        started_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    state: TrackerState,
    last_observed_at: Option<DateTime<Utc>>,
    intervals: Vec<VisibilityInterval>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn intervals(&self) -> &[VisibilityInterval] {
        &self.intervals
    }

    pub fn into_intervals(self) -> Vec<VisibilityInterval> {
        self.intervals
    }

    /// Applies one frame's snapshot. Returns the interval closed by this
    /// frame, if any; it is also appended to the session sequence.
    ///
    /// From Idle, the lowest visible id is picked. While Tracking, any
    /// non-empty snapshot keeps the slot open, whichever markers it holds.
    pub fn observe(&mut self, snapshot: &DetectionSnapshot) -> Option<VisibilityInterval> {
        let at = snapshot.timestamp;
        self.last_observed_at = Some(self.last_observed_at.map_or(at, |last| last.max(at)));

        match (self.state, snapshot.first_marker()) {
            (TrackerState::Idle, Some(marker_id)) => {
                self.state = TrackerState::Tracking {
                    marker_id,
                    started_at: at,
                };
                None
            }
            (TrackerState::Idle, None) | (TrackerState::Tracking { .. }, Some(_)) => None,
            (TrackerState::Tracking { .. }, None) => self.close(at),
        }
    }

    /// End-of-session flush. `now` is clamped to the last observed frame so a
    /// lagging clock cannot produce an interval that ends before it starts.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<VisibilityInterval> {
        let at = self.last_observed_at.map_or(now, |last| last.max(now));
        self.close(at)
    }

    fn close(&mut self, at: DateTime<Utc>) -> Option<VisibilityInterval> {
        let TrackerState::Tracking {
            marker_id,
            started_at,
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };

        let interval = VisibilityInterval {
            marker_id,
            started_at,
            ended_at: at.max(started_at),
        };
        self.intervals.push(interval);
        Some(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn snap(secs: i64, markers: &[MarkerId]) -> DetectionSnapshot {
        DetectionSnapshot::new(at(secs), markers.iter().copied())
    }

    fn interval(marker_id: MarkerId, start: i64, end: i64) -> VisibilityInterval {
        VisibilityInterval {
            marker_id,
            started_at: at(start),
            ended_at: at(end),
        }
    }

    #[test]
    fn consecutive_runs_become_intervals() {
        let mut tracker = VisibilityTracker::new();
        let frames: [&[MarkerId]; 5] = [&[1], &[1], &[], &[2], &[]];
        for (secs, markers) in frames.iter().enumerate() {
            tracker.observe(&snap(secs as i64, markers));
        }

        assert_eq!(tracker.intervals(), &[interval(1, 0, 2), interval(2, 3, 4)]);
        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    #[test]
    fn open_slot_is_closed_at_teardown() {
        let mut tracker = VisibilityTracker::new();
        tracker.observe(&snap(10, &[5]));

        let closed = tracker.finish(at(12));
        assert_eq!(closed, Some(interval(5, 10, 12)));
        assert_eq!(tracker.into_intervals(), vec![interval(5, 10, 12)]);
    }

    #[test]
    fn finish_when_idle_emits_nothing() {
        let mut tracker = VisibilityTracker::new();
        tracker.observe(&snap(0, &[]));
        assert_eq!(tracker.finish(at(3)), None);
        assert!(tracker.intervals().is_empty());
    }

    #[test]
    fn slot_stays_with_first_marker_while_others_appear() {
        let mut tracker = VisibilityTracker::new();
        tracker.observe(&snap(0, &[4, 2, 9]));
        assert_eq!(
            tracker.state(),
            TrackerState::Tracking {
                marker_id: 2,
                started_at: at(0)
            }
        );

        // Marker 2 leaves but 7 is visible: the slot stays open for 2.
        tracker.observe(&snap(1, &[7]));
        tracker.observe(&snap(2, &[]));
        assert_eq!(tracker.intervals(), &[interval(2, 0, 2)]);
    }

    #[test]
    fn duplicate_ids_collapse() {
        let snapshot = snap(0, &[3, 3, 3]);
        assert_eq!(snapshot.markers.len(), 1);
        assert_eq!(snapshot.first_marker(), Some(3));
    }

    #[test]
    fn backwards_clock_never_inverts_an_interval() {
        let mut tracker = VisibilityTracker::new();
        tracker.observe(&snap(5, &[1]));
        let closed = tracker.observe(&snap(3, &[])).unwrap();
        assert_eq!(closed, interval(1, 5, 5));

        tracker.observe(&snap(8, &[6]));
        let flushed = tracker.finish(at(1)).unwrap();
        assert_eq!(flushed, interval(6, 8, 8));
    }

    #[test]
    fn intervals_for_one_marker_never_overlap() {
        let mut tracker = VisibilityTracker::new();
        let frames: [&[MarkerId]; 7] = [&[1], &[], &[1], &[1], &[], &[1], &[]];
        for (secs, markers) in frames.iter().enumerate() {
            tracker.observe(&snap(secs as i64, markers));
        }

        let intervals = tracker.intervals();
        assert_eq!(intervals.len(), 3);
        for pair in intervals.windows(2) {
            assert!(pair[0].ended_at <= pair[1].started_at);
        }
    }
}
