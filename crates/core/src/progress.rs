//! Progress model - one student's advancement through one project.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use crate::id::{ActorId, ProgressId, ProjectId, TaskId, VerificationId};
use crate::Time;

/// Progress status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    /// Enrolled, nothing opened yet
    NotStarted,
    /// Working through the guide
    InProgress,
    /// Every section complete
    Completed,
}

impl ProgressStatus {
    /// Forward edges of the progress state machine.
    ///
    /// Going backwards is only possible through a reset, which is not a
    /// forward edge and is handled separately.
    pub fn can_transition(&self, to: ProgressStatus) -> bool {
        use ProgressStatus::*;
        matches!(
            (self, to),
            (NotStarted, InProgress) | (InProgress, Completed) | (InProgress, InProgress)
        )
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::NotStarted => write!(f, "NOT_STARTED"),
            ProgressStatus::InProgress => write!(f, "IN_PROGRESS"),
            ProgressStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Tracked completion state of one student within one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Unique identifier
    pub id: ProgressId,

    /// Student this record belongs to
    pub student_id: ActorId,

    /// Project being tracked
    pub project_id: ProjectId,

    /// Current status
    pub status: ProgressStatus,

    /// Percentage of sections complete (0-100)
    pub percent_complete: u8,

    /// Section the student is currently on
    pub current_section: Option<usize>,

    /// Completed section indices
    pub completed_sections: BTreeSet<usize>,

    /// Completed guide tasks
    pub completed_tasks: BTreeSet<TaskId>,

    /// Completed verification steps
    pub completed_verifications: BTreeSet<VerificationId>,

    /// When work started
    pub started_at: Option<Time>,

    /// When the last section was completed
    pub completed_at: Option<Time>,

    /// Last time the student touched this project
    pub last_accessed_at: Time,

    /// Optimistic concurrency version, bumped by storage on every save
    #[serde(default)]
    pub version: u64,
}

impl Progress {
    /// Create a record for a student who has opened the project.
    pub fn started(student_id: ActorId, project_id: ProjectId, now: Time) -> Self {
        Self {
            status: ProgressStatus::InProgress,
            current_section: Some(0),
            started_at: Some(now),
            ..Self::not_started(student_id, project_id, now)
        }
    }

    /// Create a record for an enrolled student who has not opened the project.
    pub fn not_started(student_id: ActorId, project_id: ProjectId, now: Time) -> Self {
        Self {
            id: ProgressId::new(),
            student_id,
            project_id,
            status: ProgressStatus::NotStarted,
            percent_complete: 0,
            current_section: None,
            completed_sections: BTreeSet::new(),
            completed_tasks: BTreeSet::new(),
            completed_verifications: BTreeSet::new(),
            started_at: None,
            completed_at: None,
            last_accessed_at: now,
            version: 0,
        }
    }

    /// Whether every section has been completed.
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}
