pub mod detection;
pub mod marker;
pub mod session;
pub mod submission;

pub use detection::{Detection, DetectionSnapshot, Frame, VisibilityInterval};
pub use marker::{
    Bgr, ColorAssignment, GroundTruth, LeakGroundTruth, MarkerColor, MarkerId, MarkerRecord,
};
pub use session::{SessionRecord, SessionStatus, TrialKey};
pub use submission::{flag_str, parse_flag, Submission, SubmissionDraft, MAX_LOCATION_PARTS};
