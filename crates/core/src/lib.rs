//! LabMan core data models.
//!
//! This crate defines the records that flow through the progress and
//! submission lifecycle: actors, the curriculum tree, progress records, lab
//! submissions, and the shared error taxonomy.

#![warn(missing_docs)]

// Core identities
mod id;
mod actor;

// Curriculum
mod curriculum;

// Lifecycle records
mod progress;
mod submission;

// Shared plumbing
mod clock;
mod error;

// Re-exports
pub use id::*;
pub use actor::{Actor, Permission, Role};
pub use curriculum::{
    Classroom, GuideTask, Lab, NodeStatus, Project, Section, VerificationStep, DEFAULT_MAX_GRADE,
};
pub use progress::{Progress, ProgressStatus};
pub use submission::{LabSubmission, SubmissionFile, SubmissionStatus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
