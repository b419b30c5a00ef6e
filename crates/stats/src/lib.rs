//! Aggregate statistics: completion rates, grade averages and per-status
//! counts over progress records and submissions.

#![warn(missing_docs)]

pub mod metrics;
pub mod engine;

pub use metrics::{
    average_grade, completion_rate, count_where, is_late, latest_submission, tally, ProgressStats,
    ScoreRange, ScoreStats, SubmissionStats, Tally,
};
pub use engine::{AggregationEngine, LabStats, ProjectStats};
