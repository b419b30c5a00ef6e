//! Lab submission lifecycle.
//!
//! DRAFT → SUBMITTED | LATE → GRADED, with attempt numbering per
//! (student, lab) and draft editing until hand-in.

#![warn(missing_docs)]

pub mod lifecycle;
pub mod service;

pub use service::{BasicSubmissionService, LifecycleConfig, SubmissionService};
