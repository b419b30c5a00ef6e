//! Actions of the lifecycle core and what each one requires.

use labman_core::{Permission, Role};
use serde::{Deserialize, Serialize};

use crate::gate::AccessRequirement;

/// Every operation that passes through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Open a project (creates the progress record)
    StartProject,
    /// Move the current-section pointer
    VisitSection,
    /// Mark a guide section complete
    CompleteSection,
    /// Mark a guide task complete
    CompleteTask,
    /// Mark a verification step complete
    CompleteVerification,
    /// Clear progress after a lab environment reset
    ResetProgress,
    /// Read a progress record
    ViewProgress,
    /// Start a new submission attempt
    CreateDraft,
    /// Change draft content or attachments
    EditDraft,
    /// Hand in a draft
    SubmitLab,
    /// Score a handed-in submission
    GradeSubmission,
    /// Read attempt history
    ListAttempts,
    /// Read aggregate statistics
    ViewStatistics,
    /// Import or edit curriculum nodes
    ManageCurriculum,
}

impl Action {
    /// Requirement table.
    pub fn requirement(&self) -> AccessRequirement {
        match self {
            Action::StartProject
            | Action::VisitSection
            | Action::CompleteSection
            | Action::CompleteTask
            | Action::CompleteVerification => AccessRequirement::all_of([Permission::UpdateProgress]),
            Action::ResetProgress => AccessRequirement::all_of([Permission::ResetProgress]),
            Action::ViewProgress => AccessRequirement::all_of([Permission::ViewProgress]),
            Action::CreateDraft | Action::EditDraft | Action::SubmitLab => {
                AccessRequirement::all_of([Permission::SubmitLab])
            }
            Action::GradeSubmission => AccessRequirement::roles([Role::Instructor, Role::Administrator]),
            Action::ListAttempts => AccessRequirement::all_of([Permission::ViewSubmissions]),
            Action::ViewStatistics => AccessRequirement::all_of([Permission::ViewStatistics]),
            Action::ManageCurriculum => AccessRequirement::all_of([Permission::ManageCurriculum]),
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StartProject => "start_project",
            Action::VisitSection => "visit_section",
            Action::CompleteSection => "complete_section",
            Action::CompleteTask => "complete_task",
            Action::CompleteVerification => "complete_verification",
            Action::ResetProgress => "reset_progress",
            Action::ViewProgress => "view_progress",
            Action::CreateDraft => "create_draft",
            Action::EditDraft => "edit_draft",
            Action::SubmitLab => "submit_lab",
            Action::GradeSubmission => "grade_submission",
            Action::ListAttempts => "list_attempts",
            Action::ViewStatistics => "view_statistics",
            Action::ManageCurriculum => "manage_curriculum",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
