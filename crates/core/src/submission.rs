//! Lab submission model - attempts, status and grading.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::{Error, Result};
use crate::id::{ActorId, FileId, LabId, ProjectId, SubmissionId};
use crate::Time;

/// Submission status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Being prepared by the student
    Draft,
    /// Handed in on time
    Submitted,
    /// Handed in after the due date
    Late,
    /// Scored by staff
    Graded,
}

impl SubmissionStatus {
    /// All statuses.
    pub fn all() -> [SubmissionStatus; 4] {
        [
            SubmissionStatus::Draft,
            SubmissionStatus::Submitted,
            SubmissionStatus::Late,
            SubmissionStatus::Graded,
        ]
    }

    /// Whether `from -> to` is an edge of the submission state machine.
    pub fn can_transition(from: SubmissionStatus, to: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (from, to),
            (Draft, Submitted) | (Draft, Late) | (Submitted, Graded) | (Late, Graded)
        )
    }

    /// Validate `from -> to`, returning the new status.
    pub fn transition(from: SubmissionStatus, to: SubmissionStatus) -> Result<SubmissionStatus> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(Error::invalid_transition(from, to))
        }
    }

    /// Whether the submission has been handed in and awaits a grade.
    pub fn is_awaiting_grade(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Late)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Draft => write!(f, "DRAFT"),
            SubmissionStatus::Submitted => write!(f, "SUBMITTED"),
            SubmissionStatus::Late => write!(f, "LATE"),
            SubmissionStatus::Graded => write!(f, "GRADED"),
        }
    }
}

/// A file attached to exactly one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionFile {
    /// Unique identifier
    pub id: FileId,

    /// Original file name
    pub name: String,

    /// Where the upload collaborator stored it
    pub url: String,

    /// Upload time
    pub uploaded_at: Time,
}

impl SubmissionFile {
    /// Create a file record.
    pub fn new(name: impl Into<String>, url: impl Into<String>, uploaded_at: Time) -> Self {
        Self {
            id: FileId::new(),
            name: name.into(),
            url: url.into(),
            uploaded_at,
        }
    }
}

/// One attempt by a student at a lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSubmission {
    /// Unique identifier
    pub id: SubmissionId,

    /// Author
    pub student_id: ActorId,

    /// Lab being submitted
    pub lab_id: LabId,

    /// Project owning the lab
    pub project_id: ProjectId,

    /// Attempt ordinal, starting at 1
    pub attempt: u32,

    /// Current status
    pub status: SubmissionStatus,

    /// Written answer / report
    pub content: String,

    /// Attached files
    pub files: Vec<SubmissionFile>,

    /// Score, once graded
    pub grade: Option<f64>,

    /// Grader feedback
    pub feedback: Option<String>,

    /// Who graded it
    pub graded_by: Option<ActorId>,

    /// When it was graded
    pub graded_at: Option<Time>,

    /// When it was handed in
    pub submitted_at: Option<Time>,

    /// Lab due date at creation time
    pub due_date: Option<Time>,

    /// When the draft was created
    pub created_at: Time,

    /// Last modification
    pub updated_at: Time,

    /// Optimistic concurrency version, bumped by storage on every save
    #[serde(default)]
    pub version: u64,
}

impl LabSubmission {
    /// Create a draft for the given attempt.
    pub fn draft(
        student_id: ActorId,
        lab_id: LabId,
        project_id: ProjectId,
        attempt: u32,
        due_date: Option<Time>,
        now: Time,
    ) -> Self {
        Self {
            id: SubmissionId::new(),
            student_id,
            lab_id,
            project_id,
            attempt,
            status: SubmissionStatus::Draft,
            content: String::new(),
            files: Vec::new(),
            grade: None,
            feedback: None,
            graded_by: None,
            graded_at: None,
            submitted_at: None,
            due_date,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Content and attachments can only change while drafting.
    pub fn is_editable(&self) -> bool {
        self.status == SubmissionStatus::Draft
    }
}
