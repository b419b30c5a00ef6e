//! Student progress tracking.
//!
//! Pure section/task/verification transitions plus the service that loads,
//! authorizes and persists them.

#![warn(missing_docs)]

pub mod transition;
pub mod tracker;

pub use transition::percent_complete;
pub use tracker::{BasicProgressTracker, ProgressTracker};
