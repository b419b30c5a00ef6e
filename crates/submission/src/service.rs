//! Submission service: loads records and curriculum, applies lifecycle
//! operations, persists under the version check.

use std::sync::Arc;
use async_trait::async_trait;
use labman_access::{AccessGate, Action};
use labman_core::{
    Actor, ActorId, Clock, Error, FileId, Lab, LabId, LabSubmission, ProgressStatus, ProjectId,
    Result, SubmissionFile, SubmissionId, SubmissionStatus, SystemClock,
};
use labman_storage::{Storage, SubmissionFilter};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use crate::lifecycle;

/// Lifecycle policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Refuse to submit unless the student has started the lab's project.
    pub require_started_progress: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            require_started_progress: true,
        }
    }
}

/// Submission lifecycle service.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    /// Open a new DRAFT attempt.
    async fn create_draft(&self, actor: &Actor, student_id: &ActorId, lab_id: LabId) -> Result<LabSubmission>;

    /// Replace a draft's content.
    async fn update_content(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        content: String,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission>;

    /// Attach a file to a draft.
    async fn attach_file(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        name: String,
        url: String,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission>;

    /// Remove a file from a draft.
    async fn remove_file(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        file_id: FileId,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission>;

    /// Hand in a draft.
    async fn submit(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission>;

    /// Hand in the student's highest-attempt draft for a lab.
    async fn submit_latest_draft(&self, actor: &Actor, student_id: &ActorId, lab_id: LabId) -> Result<LabSubmission>;

    /// Score a handed-in submission.
    async fn grade(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        grade: f64,
        feedback: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission>;

    /// Load one submission.
    async fn get(&self, actor: &Actor, submission_id: SubmissionId) -> Result<LabSubmission>;

    /// A student's attempts at a lab, ascending by attempt.
    async fn list_attempts(&self, actor: &Actor, student_id: &ActorId, lab_id: LabId) -> Result<Vec<LabSubmission>>;
}

/// Basic submission service implementation.
pub struct BasicSubmissionService<S: Storage> {
    storage: Arc<Mutex<S>>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl<S: Storage> BasicSubmissionService<S> {
    /// Create a new submission service.
    pub fn new(storage: S) -> Self {
        Self::shared(Arc::new(Mutex::new(storage)))
    }

    /// Create a service over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            config: LifecycleConfig::default(),
        }
    }

    /// Set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the lifecycle policy.
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared storage handle.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    /// Load a submission, check owner access and version, apply `f`, save.
    async fn mutate<F>(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        expected_version: Option<u64>,
        f: F,
    ) -> Result<LabSubmission>
    where
        F: FnOnce(&LabSubmission) -> Result<LabSubmission> + Send,
    {
        let mut storage = self.storage.lock().await;
        let current = load_submission(&*storage, submission_id).await?;
        AccessGate::authorize_for_student(actor, Action::EditDraft, &current.student_id)?;
        Error::ensure_version(format!("submission {}", submission_id), expected_version, current.version)?;

        let mut next = f(&current)?;
        next.version = storage.save_submission(&next).await?;
        tracing::debug!(submission = %next.id, version = next.version, "draft updated");
        Ok(next)
    }

    /// Submit an already-loaded, already-authorized draft while holding the storage lock.
    async fn submit_loaded(&self, storage: &mut S, current: LabSubmission) -> Result<LabSubmission> {
        let lab = load_lab(storage, current.lab_id).await?.1;

        if self.config.require_started_progress {
            let started = storage
                .find_progress(&current.student_id, current.project_id)
                .await?
                .map_or(false, |p| p.status != ProgressStatus::NotStarted);
            if !started {
                tracing::warn!(
                    submission = %current.id,
                    student = %current.student_id,
                    project = %current.project_id,
                    "submit refused: project not started"
                );
                return Err(Error::invalid_transition(ProgressStatus::NotStarted, "submit"));
            }
        }

        // the lab's due date at submit time decides lateness
        let mut current = current;
        current.due_date = lab.due_date;

        let mut next = lifecycle::submit(&current, self.clock.now())?;
        next.version = storage.save_submission(&next).await?;

        tracing::info!(
            submission = %next.id,
            student = %next.student_id,
            lab = %next.lab_id,
            attempt = next.attempt,
            status = %next.status,
            "lab submitted"
        );
        Ok(next)
    }
}

#[async_trait]
impl<S: Storage + 'static> SubmissionService for BasicSubmissionService<S> {
    async fn create_draft(&self, actor: &Actor, student_id: &ActorId, lab_id: LabId) -> Result<LabSubmission> {
        AccessGate::authorize_for_student(actor, Action::CreateDraft, student_id)?;

        let mut storage = self.storage.lock().await;
        let (project_id, lab) = load_lab(&*storage, lab_id).await?;
        let existing = storage
            .list_submissions(&SubmissionFilter::attempts(student_id.clone(), lab_id))
            .await?;

        let mut draft = lifecycle::create_draft(&existing, student_id.clone(), &lab, project_id, self.clock.now());
        draft.version = storage.save_submission(&draft).await?;

        tracing::debug!(submission = %draft.id, attempt = draft.attempt, "draft created");
        Ok(draft)
    }

    async fn update_content(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        content: String,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission> {
        let now = self.clock.now();
        self.mutate(actor, submission_id, expected_version, |s| {
            lifecycle::update_content(s, content, now)
        })
        .await
    }

    async fn attach_file(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        name: String,
        url: String,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission> {
        let now = self.clock.now();
        let file = SubmissionFile::new(name, url, now);
        self.mutate(actor, submission_id, expected_version, |s| {
            lifecycle::attach_file(s, file, now)
        })
        .await
    }

    async fn remove_file(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        file_id: FileId,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission> {
        let now = self.clock.now();
        self.mutate(actor, submission_id, expected_version, |s| {
            lifecycle::remove_file(s, file_id, now)
        })
        .await
    }

    async fn submit(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission> {
        let mut storage = self.storage.lock().await;
        let current = load_submission(&*storage, submission_id).await?;
        AccessGate::authorize_for_student(actor, Action::SubmitLab, &current.student_id)?;
        Error::ensure_version(format!("submission {}", submission_id), expected_version, current.version)?;
        self.submit_loaded(&mut *storage, current).await
    }

    async fn submit_latest_draft(&self, actor: &Actor, student_id: &ActorId, lab_id: LabId) -> Result<LabSubmission> {
        AccessGate::authorize_for_student(actor, Action::SubmitLab, student_id)?;

        let mut storage = self.storage.lock().await;
        let draft = storage
            .list_submissions(&SubmissionFilter {
                status: Some(vec![SubmissionStatus::Draft]),
                ..SubmissionFilter::attempts(student_id.clone(), lab_id)
            })
            .await?
            .into_iter()
            .max_by_key(|s| s.attempt)
            .ok_or_else(|| Error::NotFound(format!("draft of {} for lab {}", student_id, lab_id)))?;

        self.submit_loaded(&mut *storage, draft).await
    }

    async fn grade(
        &self,
        actor: &Actor,
        submission_id: SubmissionId,
        grade: f64,
        feedback: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<LabSubmission> {
        AccessGate::authorize(actor, Action::GradeSubmission)?;

        let mut storage = self.storage.lock().await;
        let current = load_submission(&*storage, submission_id).await?;
        Error::ensure_version(format!("submission {}", submission_id), expected_version, current.version)?;
        let (_, lab) = load_lab(&*storage, current.lab_id).await?;

        let mut next = lifecycle::grade(actor, &current, &lab, grade, feedback, self.clock.now()).map_err(|e| {
            tracing::warn!(submission = %submission_id, grader = %actor.id, error = %e, "grading rejected");
            e
        })?;
        next.version = storage.save_submission(&next).await?;

        tracing::info!(
            submission = %next.id,
            grader = %actor.id,
            grade,
            "submission graded"
        );
        Ok(next)
    }

    async fn get(&self, actor: &Actor, submission_id: SubmissionId) -> Result<LabSubmission> {
        let submission = load_submission(&*self.storage.lock().await, submission_id).await?;
        AccessGate::authorize_for_student(actor, Action::ListAttempts, &submission.student_id)?;
        Ok(submission)
    }

    async fn list_attempts(&self, actor: &Actor, student_id: &ActorId, lab_id: LabId) -> Result<Vec<LabSubmission>> {
        AccessGate::authorize_for_student(actor, Action::ListAttempts, student_id)?;
        Ok(self
            .storage
            .lock()
            .await
            .list_submissions(&SubmissionFilter::attempts(student_id.clone(), lab_id))
            .await?)
    }
}

async fn load_submission<S: Storage>(storage: &S, id: SubmissionId) -> Result<LabSubmission> {
    storage
        .load_submission(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("submission {}", id)))
}

async fn load_lab<S: Storage>(storage: &S, id: LabId) -> Result<(ProjectId, Lab)> {
    storage
        .find_lab(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("lab {}", id)))
}
