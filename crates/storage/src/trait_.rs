//! Storage trait abstraction.

use async_trait::async_trait;
use labman_core::{
    ActorId, Classroom, ClassroomId, Lab, LabId, LabSubmission, Progress, ProgressId,
    ProgressStatus, Project, ProjectId, SubmissionId, SubmissionStatus,
};
use serde::{Deserialize, Serialize};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored version differs from the version the writer read
    #[error("Version conflict on {entity}: expected {expected}, stored {actual}")]
    Conflict {
        /// Entity description
        entity: String,
        /// Version carried by the incoming record
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<StorageError> for labman_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => labman_core::Error::NotFound(what),
            StorageError::Conflict {
                entity,
                expected,
                actual,
            } => labman_core::Error::Conflict {
                entity,
                expected,
                actual,
            },
            other => labman_core::Error::Storage(other.to_string()),
        }
    }
}

/// Filter for querying progress records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressFilter {
    /// Filter by student
    pub student_id: Option<ActorId>,

    /// Filter by project
    pub project_id: Option<ProjectId>,

    /// Filter by status
    pub status: Option<Vec<ProgressStatus>>,
}

impl ProgressFilter {
    /// Records of one project.
    pub fn project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    /// Whether a record passes the filter.
    pub fn matches(&self, p: &Progress) -> bool {
        self.student_id.as_ref().map_or(true, |s| &p.student_id == s)
            && self.project_id.map_or(true, |id| p.project_id == id)
            && self.status.as_ref().map_or(true, |st| st.contains(&p.status))
    }
}

/// Filter for querying lab submissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionFilter {
    /// Filter by student
    pub student_id: Option<ActorId>,

    /// Filter by lab
    pub lab_id: Option<LabId>,

    /// Filter by project
    pub project_id: Option<ProjectId>,

    /// Filter by status
    pub status: Option<Vec<SubmissionStatus>>,
}

impl SubmissionFilter {
    /// Attempts of one student at one lab.
    pub fn attempts(student_id: ActorId, lab_id: LabId) -> Self {
        Self {
            student_id: Some(student_id),
            lab_id: Some(lab_id),
            ..Default::default()
        }
    }

    /// Whether a record passes the filter.
    pub fn matches(&self, s: &LabSubmission) -> bool {
        self.student_id.as_ref().map_or(true, |id| &s.student_id == id)
            && self.lab_id.map_or(true, |id| s.lab_id == id)
            && self.project_id.map_or(true, |id| s.project_id == id)
            && self.status.as_ref().map_or(true, |st| st.contains(&s.status))
    }
}

/// Storage abstraction for LabMan data.
///
/// Curriculum nodes are read-mostly and saved without version checks.
/// Progress records and submissions carry a `version`: a save succeeds only
/// when the incoming version equals the stored one (0 for a record that was
/// never saved) and returns the new stored version.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Curriculum operations ===

    /// Save a classroom.
    async fn save_classroom(&mut self, classroom: &Classroom) -> Result<()>;

    /// Load a classroom by ID.
    async fn load_classroom(&self, id: ClassroomId) -> Result<Option<Classroom>>;

    /// Save a project together with its labs.
    async fn save_project(&mut self, project: &Project) -> Result<()>;

    /// Load a project by ID.
    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// List all projects.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Find a lab and the project that owns it.
    async fn find_lab(&self, id: LabId) -> Result<Option<(ProjectId, Lab)>> {
        let projects = self.list_projects().await?;
        Ok(projects
            .into_iter()
            .find_map(|p| p.lab(id).cloned().map(|lab| (p.id, lab))))
    }

    // === Progress operations ===

    /// Save a progress record, returning its new version.
    async fn save_progress(&mut self, progress: &Progress) -> Result<u64>;

    /// Load a progress record by ID.
    async fn load_progress(&self, id: ProgressId) -> Result<Option<Progress>>;

    /// List progress records matching the filter.
    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<Progress>>;

    /// The record for a (student, project) pair.
    async fn find_progress(&self, student_id: &ActorId, project_id: ProjectId) -> Result<Option<Progress>> {
        let filter = ProgressFilter {
            student_id: Some(student_id.clone()),
            project_id: Some(project_id),
            status: None,
        };
        Ok(self.list_progress(&filter).await?.into_iter().next())
    }

    // === Submission operations ===

    /// Save a submission, returning its new version.
    async fn save_submission(&mut self, submission: &LabSubmission) -> Result<u64>;

    /// Load a submission by ID.
    async fn load_submission(&self, id: SubmissionId) -> Result<Option<LabSubmission>>;

    /// List submissions matching the filter.
    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<LabSubmission>>;
}

/// Compare an incoming version against the stored one.
pub(crate) fn check_version(entity: &str, incoming: u64, stored: Option<u64>) -> Result<u64> {
    let actual = stored.unwrap_or(0);
    if incoming != actual {
        return Err(StorageError::Conflict {
            entity: entity.to_string(),
            expected: incoming,
            actual,
        });
    }
    Ok(actual + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_version() {
        assert_eq!(check_version("progress x", 0, None).unwrap(), 1);
        assert_eq!(check_version("progress x", 3, Some(3)).unwrap(), 4);

        let err = check_version("progress x", 2, Some(3)).unwrap_err();
        assert!(matches!(err, StorageError::Conflict { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn test_conflict_keeps_its_kind() {
        let err: labman_core::Error = StorageError::Conflict {
            entity: "submission".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert_eq!(err.kind(), "Conflict");

        let err: labman_core::Error = StorageError::Other("disk full".to_string()).into();
        assert_eq!(err.kind(), "Storage");
    }
}
