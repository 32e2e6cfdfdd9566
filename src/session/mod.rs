pub mod controller;

pub use controller::{ExperimentSession, SessionController};
