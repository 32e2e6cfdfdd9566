pub mod controller;
pub mod loop_worker;
pub mod source;
pub mod state;

pub use controller::TrackingController;
pub use loop_worker::{tracking_loop, TrackingEnd, TrackingReport};
pub use source::{DetectionSource, JsonLinesSource, ReplaySource};
pub use state::{TrackerState, VisibilityTracker};
