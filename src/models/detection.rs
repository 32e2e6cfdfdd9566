use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::MarkerId;

/// A single marker reported by the external detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub marker_id: MarkerId,
    #[serde(default)]
    pub corners: [[f32; 2]; 4],
}

/// Detector output for one captured frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn snapshot(&self) -> DetectionSnapshot {
        DetectionSnapshot::new(
            self.timestamp,
            self.detections.iter().map(|detection| detection.marker_id),
        )
    }
}

/// Markers visible in one frame. Stored as a set so repeated ids collapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub markers: BTreeSet<MarkerId>,
}

impl DetectionSnapshot {
    pub fn new<I>(timestamp: DateTime<Utc>, markers: I) -> Self
    where
        I: IntoIterator<Item = MarkerId>,
    {
        Self {
            timestamp,
            markers: markers.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Lowest visible id; the tracker's tie-break among simultaneous markers.
    pub fn first_marker(&self) -> Option<MarkerId> {
        self.markers.iter().next().copied()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityInterval {
    pub marker_id: MarkerId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl VisibilityInterval {
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}
