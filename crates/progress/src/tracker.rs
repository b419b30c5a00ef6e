//! Progress tracking service.

use std::sync::Arc;
use async_trait::async_trait;
use labman_access::{AccessGate, Action};
use labman_core::{
    Actor, ActorId, Clock, Error, Progress, ProgressId, ProgressStatus, Project, ProjectId, Result,
    SystemClock, TaskId, VerificationId,
};
use labman_storage::{ProgressFilter, Storage};
use tokio::sync::Mutex;
use crate::transition;

/// Progress tracking service.
///
/// Mutations hold the storage lock from load to save, and every save goes
/// through the storage version check.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Open a project for a student, creating the record on first access.
    async fn start_project(&self, actor: &Actor, student_id: &ActorId, project_id: ProjectId) -> Result<Progress>;

    /// Point the record at a section without completing it.
    async fn visit_section(&self, actor: &Actor, progress_id: ProgressId, section_index: usize) -> Result<Progress>;

    /// Complete a section by flat index.
    async fn complete_section(
        &self,
        actor: &Actor,
        progress_id: ProgressId,
        section_index: usize,
        expected_version: Option<u64>,
    ) -> Result<Progress>;

    /// Complete a guide task.
    async fn complete_task(&self, actor: &Actor, progress_id: ProgressId, task_id: TaskId) -> Result<Progress>;

    /// Complete a verification step.
    async fn complete_verification(
        &self,
        actor: &Actor,
        progress_id: ProgressId,
        verification_id: VerificationId,
    ) -> Result<Progress>;

    /// Clear completion state.
    async fn reset_progress(
        &self,
        actor: &Actor,
        progress_id: ProgressId,
        expected_version: Option<u64>,
    ) -> Result<Progress>;

    /// Load a record by id.
    async fn get(&self, actor: &Actor, progress_id: ProgressId) -> Result<Progress>;

    /// Load the record for a (student, project) pair.
    async fn get_progress(&self, actor: &Actor, student_id: &ActorId, project_id: ProjectId) -> Result<Progress>;

    /// All records of a project the actor may see.
    async fn list_for_project(&self, actor: &Actor, project_id: ProjectId) -> Result<Vec<Progress>>;
}

/// Basic progress tracker implementation.
pub struct BasicProgressTracker<S: Storage> {
    storage: Arc<Mutex<S>>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> BasicProgressTracker<S> {
    /// Create a new progress tracker.
    pub fn new(storage: S) -> Self {
        Self::shared(Arc::new(Mutex::new(storage)))
    }

    /// Create a tracker over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shared storage handle.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    /// Load a record, authorize the actor against its owner, apply `f`, save.
    async fn mutate<F>(
        &self,
        actor: &Actor,
        action: Action,
        progress_id: ProgressId,
        expected_version: Option<u64>,
        f: F,
    ) -> Result<Progress>
    where
        F: FnOnce(&Progress, &Project) -> Result<Progress> + Send,
    {
        let mut storage = self.storage.lock().await;

        let current = storage
            .load_progress(progress_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("progress {}", progress_id)))?;
        AccessGate::authorize_for_student(actor, action, &current.student_id)?;
        Error::ensure_version(format!("progress {}", progress_id), expected_version, current.version)?;

        let project = storage
            .load_project(current.project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {}", current.project_id)))?;

        let mut next = f(&current, &project)?;
        next.version = storage.save_progress(&next).await?;

        tracing::debug!(
            progress = %next.id,
            action = action.as_str(),
            status = %next.status,
            percent = next.percent_complete,
            version = next.version,
            "progress updated"
        );
        if current.status != next.status {
            tracing::info!(
                progress = %next.id,
                student = %next.student_id,
                from = %current.status,
                to = %next.status,
                "progress status changed"
            );
        }

        Ok(next)
    }
}

#[async_trait]
impl<S: Storage + 'static> ProgressTracker for BasicProgressTracker<S> {
    async fn start_project(&self, actor: &Actor, student_id: &ActorId, project_id: ProjectId) -> Result<Progress> {
        AccessGate::authorize_for_student(actor, Action::StartProject, student_id)?;

        let mut storage = self.storage.lock().await;
        let project = storage
            .load_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;

        let existing = storage.find_progress(student_id, project_id).await?;
        if let Some(p) = existing.as_ref().filter(|p| p.status != ProgressStatus::NotStarted) {
            tracing::debug!(progress = %p.id, "project already started");
            return Ok(p.clone());
        }

        let mut progress = transition::start_project(existing, student_id.clone(), &project, self.clock.now());
        progress.version = storage.save_progress(&progress).await?;

        tracing::info!(
            progress = %progress.id,
            student = %student_id,
            project = %project_id,
            "project started"
        );
        Ok(progress)
    }

    async fn visit_section(&self, actor: &Actor, progress_id: ProgressId, section_index: usize) -> Result<Progress> {
        let now = self.clock.now();
        self.mutate(actor, Action::VisitSection, progress_id, None, |p, project| {
            transition::visit_section(p, project, section_index, now)
        })
        .await
    }

    async fn complete_section(
        &self,
        actor: &Actor,
        progress_id: ProgressId,
        section_index: usize,
        expected_version: Option<u64>,
    ) -> Result<Progress> {
        let now = self.clock.now();
        self.mutate(actor, Action::CompleteSection, progress_id, expected_version, |p, project| {
            transition::complete_section(p, project, section_index, now)
        })
        .await
    }

    async fn complete_task(&self, actor: &Actor, progress_id: ProgressId, task_id: TaskId) -> Result<Progress> {
        let now = self.clock.now();
        self.mutate(actor, Action::CompleteTask, progress_id, None, |p, project| {
            transition::complete_task(p, project, task_id, now)
        })
        .await
    }

    async fn complete_verification(
        &self,
        actor: &Actor,
        progress_id: ProgressId,
        verification_id: VerificationId,
    ) -> Result<Progress> {
        let now = self.clock.now();
        self.mutate(actor, Action::CompleteVerification, progress_id, None, |p, project| {
            transition::complete_verification(p, project, verification_id, now)
        })
        .await
    }

    async fn reset_progress(
        &self,
        actor: &Actor,
        progress_id: ProgressId,
        expected_version: Option<u64>,
    ) -> Result<Progress> {
        let now = self.clock.now();
        self.mutate(actor, Action::ResetProgress, progress_id, expected_version, |p, _| {
            Ok(transition::reset_progress(p, now))
        })
        .await
    }

    async fn get(&self, actor: &Actor, progress_id: ProgressId) -> Result<Progress> {
        let progress = self
            .storage
            .lock()
            .await
            .load_progress(progress_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("progress {}", progress_id)))?;
        AccessGate::authorize_for_student(actor, Action::ViewProgress, &progress.student_id)?;
        Ok(progress)
    }

    async fn get_progress(&self, actor: &Actor, student_id: &ActorId, project_id: ProjectId) -> Result<Progress> {
        AccessGate::authorize_for_student(actor, Action::ViewProgress, student_id)?;
        self.storage
            .lock()
            .await
            .find_progress(student_id, project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("progress of {} in project {}", student_id, project_id)))
    }

    async fn list_for_project(&self, actor: &Actor, project_id: ProjectId) -> Result<Vec<Progress>> {
        AccessGate::authorize(actor, Action::ViewProgress)?;

        let mut filter = ProgressFilter::project(project_id);
        if !actor.role.is_staff() {
            filter.student_id = Some(actor.id.clone());
        }
        Ok(self.storage.lock().await.list_progress(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use labman_core::{ClassroomId, FixedClock, GuideTask, Lab, Section};
    use labman_storage::MemoryStorage;

    async fn setup(sections: usize) -> (BasicProgressTracker<MemoryStorage>, Project, Arc<FixedClock>) {
        let mut lab = Lab::new("Routing");
        for i in 0..sections {
            lab = lab.with_section(Section::new(format!("Step {}", i)).with_task(GuideTask::new("Configure")));
        }
        let project = Project::new(ClassroomId::new(), "Networks").with_lab(lab);

        let mut storage = MemoryStorage::new();
        storage.save_project(&project).await.unwrap();

        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tracker = BasicProgressTracker::new(storage).with_clock(clock.clone());
        (tracker, project, clock)
    }

    #[tokio::test]
    async fn test_start_project_creates_once() {
        let (tracker, project, _) = setup(2).await;
        let alice = Actor::student("alice");

        let first = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();
        assert_eq!(first.status, ProgressStatus::InProgress);
        assert_eq!(first.version, 1);

        let second = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.version, 1);
    }

    #[tokio::test]
    async fn test_start_unknown_project() {
        let (tracker, _, _) = setup(1).await;
        let alice = Actor::student("alice");
        let err = tracker.start_project(&alice, &alice.id, ProjectId::new()).await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }

    #[tokio::test]
    async fn test_complete_all_sections() {
        let (tracker, project, clock) = setup(3).await;
        let alice = Actor::student("alice");
        let p = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();

        tracker.complete_section(&alice, p.id, 0, None).await.unwrap();
        tracker.complete_section(&alice, p.id, 1, None).await.unwrap();
        clock.set(clock.now() + Duration::minutes(30));
        let done = tracker.complete_section(&alice, p.id, 2, None).await.unwrap();

        assert_eq!(done.percent_complete, 100);
        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.completed_at, Some(clock.now()));
        assert_eq!(done.version, 4);

        let loaded = tracker.get_progress(&alice, &alice.id, project.id).await.unwrap();
        assert_eq!(loaded, done);
    }

    #[tokio::test]
    async fn test_stale_expected_version() {
        let (tracker, project, _) = setup(3).await;
        let alice = Actor::student("alice");
        let p = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();

        tracker.complete_section(&alice, p.id, 0, Some(p.version)).await.unwrap();
        let err = tracker.complete_section(&alice, p.id, 1, Some(p.version)).await.unwrap_err();
        assert_eq!(err.kind(), "Conflict");
    }

    #[tokio::test]
    async fn test_other_student_denied() {
        let (tracker, project, _) = setup(2).await;
        let alice = Actor::student("alice");
        let bob = Actor::student("bob");
        let p = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();

        let err = tracker.complete_section(&bob, p.id, 0, None).await.unwrap_err();
        assert_eq!(err.kind(), "PermissionDenied");

        let err = tracker.start_project(&bob, &alice.id, project.id).await.unwrap_err();
        assert_eq!(err.kind(), "PermissionDenied");
    }

    #[tokio::test]
    async fn test_instructor_resets_but_cannot_complete() {
        let (tracker, project, _) = setup(2).await;
        let alice = Actor::student("alice");
        let teacher = Actor::instructor("prof");
        let p = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();
        tracker.complete_section(&alice, p.id, 0, None).await.unwrap();

        let err = tracker.complete_section(&teacher, p.id, 1, None).await.unwrap_err();
        assert_eq!(err.kind(), "PermissionDenied");

        let reset = tracker.reset_progress(&teacher, p.id, None).await.unwrap();
        assert_eq!(reset.percent_complete, 0);
        assert!(reset.completed_sections.is_empty());
    }

    #[tokio::test]
    async fn test_task_completion_keeps_percent() {
        let (tracker, project, _) = setup(2).await;
        let alice = Actor::student("alice");
        let task_id = project.labs[0].sections[0].tasks[0].id;
        let p = tracker.start_project(&alice, &alice.id, project.id).await.unwrap();

        let updated = tracker.complete_task(&alice, p.id, task_id).await.unwrap();
        assert!(updated.completed_tasks.contains(&task_id));
        assert_eq!(updated.percent_complete, 0);

        let err = tracker.complete_task(&alice, p.id, TaskId::new()).await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }

    #[tokio::test]
    async fn test_list_for_project_scoped_to_student() {
        let (tracker, project, _) = setup(1).await;
        let alice = Actor::student("alice");
        let bob = Actor::student("bob");
        tracker.start_project(&alice, &alice.id, project.id).await.unwrap();
        tracker.start_project(&bob, &bob.id, project.id).await.unwrap();

        assert_eq!(tracker.list_for_project(&alice, project.id).await.unwrap().len(), 1);
        let staff = tracker.list_for_project(&Actor::instructor("prof"), project.id).await.unwrap();
        assert_eq!(staff.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_progress() {
        let (tracker, project, _) = setup(1).await;
        let alice = Actor::student("alice");
        let err = tracker.get_progress(&alice, &alice.id, project.id).await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");

        let err = tracker.complete_section(&alice, ProgressId::new(), 0, None).await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}
