//! Request and response messages.

use labman_core::{
    ActorId, Classroom, LabId, LabSubmission, Progress, ProgressId, Project, ProjectId,
    SubmissionId, TaskId, VerificationId,
};
use labman_stats::{LabStats, ProjectStats, SubmissionStats};
use serde::{Deserialize, Serialize};
use crate::error::ApiError;

/// A request-shaped operation. The acting party travels alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Request {
    /// Open a project for a student
    #[serde(rename = "progress/start")]
    StartProject {
        student_id: ActorId,
        project_id: ProjectId,
    },

    /// Complete a section by flat index
    #[serde(rename = "progress/complete-section")]
    CompleteSection {
        progress_id: ProgressId,
        section_index: usize,
        #[serde(default)]
        expected_version: Option<u64>,
    },

    /// Move the current-section pointer
    #[serde(rename = "progress/visit-section")]
    VisitSection {
        progress_id: ProgressId,
        section_index: usize,
    },

    /// Complete a guide task
    #[serde(rename = "progress/complete-task")]
    CompleteTask {
        progress_id: ProgressId,
        task_id: TaskId,
    },

    /// Complete a verification step
    #[serde(rename = "progress/complete-verification")]
    CompleteVerification {
        progress_id: ProgressId,
        verification_id: VerificationId,
    },

    /// Clear completion state
    #[serde(rename = "progress/reset")]
    ResetProgress {
        progress_id: ProgressId,
        #[serde(default)]
        expected_version: Option<u64>,
    },

    /// Read a student's record for a project
    #[serde(rename = "progress/get")]
    GetProgress {
        student_id: ActorId,
        project_id: ProjectId,
    },

    /// Open a new draft attempt
    #[serde(rename = "submissions/draft")]
    CreateDraft {
        lab_id: LabId,
        student_id: ActorId,
    },

    /// Replace a draft's content
    #[serde(rename = "submissions/update-content")]
    UpdateContent {
        submission_id: SubmissionId,
        content: String,
        #[serde(default)]
        expected_version: Option<u64>,
    },

    /// Attach a file to a draft
    #[serde(rename = "submissions/attach-file")]
    AttachFile {
        submission_id: SubmissionId,
        name: String,
        url: String,
        #[serde(default)]
        expected_version: Option<u64>,
    },

    /// Hand in the student's latest draft
    #[serde(rename = "submissions/submit")]
    SubmitLab {
        lab_id: LabId,
        student_id: ActorId,
    },

    /// Score a handed-in submission
    #[serde(rename = "submissions/grade")]
    GradeSubmission {
        submission_id: SubmissionId,
        grade: f64,
        #[serde(default)]
        feedback: Option<String>,
        #[serde(default)]
        expected_version: Option<u64>,
    },

    /// A student's attempts at a lab
    #[serde(rename = "submissions/attempts")]
    ListAttempts {
        student_id: ActorId,
        lab_id: LabId,
    },

    /// Project aggregates
    #[serde(rename = "stats/project")]
    ProjectStats { project_id: ProjectId },

    /// Lab aggregates
    #[serde(rename = "stats/lab")]
    LabStats { lab_id: LabId },

    /// One student's submission aggregates
    #[serde(rename = "stats/student")]
    StudentStats { student_id: ActorId },

    /// Store a project tree, optionally with its classroom
    #[serde(rename = "curriculum/import")]
    ImportCurriculum {
        #[serde(default)]
        classroom: Option<Classroom>,
        project: Project,
    },
}

impl Request {
    /// Operation name, as it appears in the `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Request::StartProject { .. } => "progress/start",
            Request::CompleteSection { .. } => "progress/complete-section",
            Request::VisitSection { .. } => "progress/visit-section",
            Request::CompleteTask { .. } => "progress/complete-task",
            Request::CompleteVerification { .. } => "progress/complete-verification",
            Request::ResetProgress { .. } => "progress/reset",
            Request::GetProgress { .. } => "progress/get",
            Request::CreateDraft { .. } => "submissions/draft",
            Request::UpdateContent { .. } => "submissions/update-content",
            Request::AttachFile { .. } => "submissions/attach-file",
            Request::SubmitLab { .. } => "submissions/submit",
            Request::GradeSubmission { .. } => "submissions/grade",
            Request::ListAttempts { .. } => "submissions/attempts",
            Request::ProjectStats { .. } => "stats/project",
            Request::LabStats { .. } => "stats/lab",
            Request::StudentStats { .. } => "stats/student",
            Request::ImportCurriculum { .. } => "curriculum/import",
        }
    }
}

/// Successful result of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    /// A progress record
    Progress(Progress),
    /// A submission
    Submission(LabSubmission),
    /// Attempts, ascending
    Attempts(Vec<LabSubmission>),
    /// Project aggregates
    ProjectStats(ProjectStats),
    /// Lab aggregates
    LabStats(LabStats),
    /// Submission aggregates
    SubmissionStats(SubmissionStats),
    /// Curriculum stored
    Imported {
        /// Stored project
        project_id: ProjectId,
        /// Labs in it
        labs: usize,
        /// Sections across all labs
        sections: usize,
    },
}

/// Transport envelope: exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Result data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Response>,
    /// Error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl From<Result<Response, ApiError>> for ApiResponse {
    fn from(outcome: Result<Response, ApiError>) -> Self {
        match outcome {
            Ok(result) => Self {
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                result: None,
                error: Some(error),
            },
        }
    }
}
