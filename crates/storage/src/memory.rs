//! In-memory storage, used by tests and short-lived tools.

use std::collections::HashMap;
use async_trait::async_trait;
use labman_core::{
    Classroom, ClassroomId, LabSubmission, Progress, ProgressId, Project, ProjectId, SubmissionId,
};
use super::trait_::check_version;
use super::{ProgressFilter, Result, Storage, SubmissionFilter};

/// HashMap-backed storage with the same version semantics as [`crate::JsonStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    classrooms: HashMap<ClassroomId, Classroom>,
    projects: HashMap<ProjectId, Project>,
    progress: HashMap<ProgressId, Progress>,
    submissions: HashMap<SubmissionId, LabSubmission>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_classroom(&mut self, classroom: &Classroom) -> Result<()> {
        self.classrooms.insert(classroom.id, classroom.clone());
        Ok(())
    }

    async fn load_classroom(&self, id: ClassroomId) -> Result<Option<Classroom>> {
        Ok(self.classrooms.get(&id).cloned())
    }

    async fn save_project(&mut self, project: &Project) -> Result<()> {
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.projects.values().cloned().collect())
    }

    async fn save_progress(&mut self, progress: &Progress) -> Result<u64> {
        let stored = self.progress.get(&progress.id).map(|p| p.version);
        let version = check_version(&format!("progress {}", progress.id), progress.version, stored)?;

        let mut record = progress.clone();
        record.version = version;
        self.progress.insert(record.id, record);
        Ok(version)
    }

    async fn load_progress(&self, id: ProgressId) -> Result<Option<Progress>> {
        Ok(self.progress.get(&id).cloned())
    }

    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<Progress>> {
        Ok(self
            .progress
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn save_submission(&mut self, submission: &LabSubmission) -> Result<u64> {
        let stored = self.submissions.get(&submission.id).map(|s| s.version);
        let version = check_version(
            &format!("submission {}", submission.id),
            submission.version,
            stored,
        )?;

        let mut record = submission.clone();
        record.version = version;
        self.submissions.insert(record.id, record);
        Ok(version)
    }

    async fn load_submission(&self, id: SubmissionId) -> Result<Option<LabSubmission>> {
        Ok(self.submissions.get(&id).cloned())
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<LabSubmission>> {
        let mut matching: Vec<LabSubmission> = self
            .submissions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.attempt.cmp(&b.attempt).then(a.created_at.cmp(&b.created_at)));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use labman_core::{ActorId, LabId, SubmissionStatus};

    #[tokio::test]
    async fn test_stale_submission_write_rejected() {
        let mut storage = MemoryStorage::new();
        let draft = LabSubmission::draft(
            ActorId::new("s1"),
            LabId::new(),
            ProjectId::new(),
            1,
            None,
            chrono::Utc::now(),
        );
        storage.save_submission(&draft).await.unwrap();

        let first = storage.load_submission(draft.id).await.unwrap().unwrap();
        let second = first.clone();

        let mut graded = first;
        graded.grade = Some(90.0);
        assert_eq!(storage.save_submission(&graded).await.unwrap(), 2);

        let mut overwrite = second;
        overwrite.grade = Some(40.0);
        let err = storage.save_submission(&overwrite).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { expected: 1, actual: 2, .. }));

        let stored = storage.load_submission(draft.id).await.unwrap().unwrap();
        assert_eq!(stored.grade, Some(90.0));
    }

    #[tokio::test]
    async fn test_filter_by_status() {
        let mut storage = MemoryStorage::new();
        let lab_id = LabId::new();
        let project_id = ProjectId::new();
        let now = chrono::Utc::now();

        let draft = LabSubmission::draft(ActorId::new("s1"), lab_id, project_id, 1, None, now);
        let mut submitted = LabSubmission::draft(ActorId::new("s2"), lab_id, project_id, 1, None, now);
        submitted.status = SubmissionStatus::Submitted;
        storage.save_submission(&draft).await.unwrap();
        storage.save_submission(&submitted).await.unwrap();

        let filter = SubmissionFilter {
            status: Some(vec![SubmissionStatus::Submitted]),
            ..Default::default()
        };
        let found = storage.list_submissions(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].student_id, ActorId::new("s2"));
    }
}
