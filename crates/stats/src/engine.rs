//! Aggregation over stored records.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use labman_access::{AccessGate, Action};
use labman_core::{Actor, ActorId, Error, LabId, LabSubmission, Progress, ProjectId, Result};
use labman_storage::{ProgressFilter, Storage, SubmissionFilter};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use crate::metrics::{ProgressStats, SubmissionStats};

/// Aggregates for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    /// Project
    pub project_id: ProjectId,
    /// Progress records of the project
    pub progress: ProgressStats,
    /// Submissions to any lab of the project
    pub submissions: SubmissionStats,
}

/// Aggregates for one lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabStats {
    /// Lab
    pub lab_id: LabId,
    /// Project owning the lab
    pub project_id: ProjectId,
    /// Distinct students with at least one attempt
    pub students: usize,
    /// All attempts
    pub submissions: SubmissionStats,
    /// Only each student's latest attempt
    pub latest: SubmissionStats,
}

/// Loads record sets from storage and hands them to the pure metrics.
///
/// Staff see every record; a student only ever sees their own.
pub struct AggregationEngine<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> AggregationEngine<S> {
    /// Create an engine over its own storage.
    pub fn new(storage: S) -> Self {
        Self::shared(Arc::new(Mutex::new(storage)))
    }

    /// Create an engine over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    /// Progress and submission aggregates for a project.
    pub async fn project_stats(&self, actor: &Actor, project_id: ProjectId) -> Result<ProjectStats> {
        AccessGate::authorize(actor, Action::ViewStatistics)?;
        let owner = scope(actor);

        let storage = self.storage.lock().await;
        let project = storage
            .load_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;

        let progress: Vec<Progress> = storage
            .list_progress(&ProgressFilter {
                student_id: owner.clone(),
                ..ProgressFilter::project(project_id)
            })
            .await?;
        let submissions: Vec<LabSubmission> = storage
            .list_submissions(&SubmissionFilter {
                student_id: owner,
                project_id: Some(project_id),
                ..Default::default()
            })
            .await?;

        let max_grades: HashMap<LabId, f64> = project.labs.iter().map(|l| (l.id, l.max_grade)).collect();
        let stats = ProjectStats {
            project_id,
            progress: ProgressStats::compute(&progress),
            submissions: SubmissionStats::compute(&submissions, |s| {
                max_grades.get(&s.lab_id).copied().unwrap_or(labman_core::DEFAULT_MAX_GRADE)
            }),
        };

        tracing::debug!(
            project = %project_id,
            records = stats.progress.total(),
            submissions = stats.submissions.total(),
            "project stats computed"
        );
        Ok(stats)
    }

    /// Submission aggregates for a lab.
    pub async fn lab_stats(&self, actor: &Actor, lab_id: LabId) -> Result<LabStats> {
        AccessGate::authorize(actor, Action::ViewStatistics)?;
        let owner = scope(actor);

        let storage = self.storage.lock().await;
        let (project_id, lab) = storage
            .find_lab(lab_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("lab {}", lab_id)))?;

        let submissions = storage
            .list_submissions(&SubmissionFilter {
                student_id: owner,
                lab_id: Some(lab_id),
                ..Default::default()
            })
            .await?;

        let mut by_student: HashMap<&ActorId, Vec<LabSubmission>> = HashMap::new();
        for s in &submissions {
            by_student.entry(&s.student_id).or_default().push(s.clone());
        }
        let latest: Vec<LabSubmission> = by_student
            .values()
            .filter_map(|attempts| crate::metrics::latest_submission(attempts).cloned())
            .collect();

        let students: BTreeSet<&ActorId> = submissions.iter().map(|s| &s.student_id).collect();
        let max_grade = lab.max_grade;

        Ok(LabStats {
            lab_id,
            project_id,
            students: students.len(),
            submissions: SubmissionStats::compute(&submissions, |_| max_grade),
            latest: SubmissionStats::compute(&latest, |_| max_grade),
        })
    }

    /// Submission aggregates across every lab for one student.
    pub async fn student_submission_stats(&self, actor: &Actor, student_id: &ActorId) -> Result<SubmissionStats> {
        AccessGate::authorize_for_student(actor, Action::ViewStatistics, student_id)?;

        let storage = self.storage.lock().await;
        let submissions = storage
            .list_submissions(&SubmissionFilter {
                student_id: Some(student_id.clone()),
                ..Default::default()
            })
            .await?;

        let mut max_grades: HashMap<LabId, f64> = HashMap::new();
        for project in storage.list_projects().await? {
            for lab in &project.labs {
                max_grades.insert(lab.id, lab.max_grade);
            }
        }

        Ok(SubmissionStats::compute(&submissions, |s| {
            max_grades.get(&s.lab_id).copied().unwrap_or(labman_core::DEFAULT_MAX_GRADE)
        }))
    }
}

/// Records a non-staff actor is limited to.
fn scope(actor: &Actor) -> Option<ActorId> {
    (!actor.role.is_staff()).then(|| actor.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use labman_core::{ClassroomId, Lab, ProgressStatus, Project, SubmissionStatus};
    use labman_storage::MemoryStorage;

    async fn seeded() -> (AggregationEngine<MemoryStorage>, Project) {
        let due = Utc::now();
        let lab = Lab::new("VLANs").with_due_date(due).with_max_grade(50.0);
        let project = Project::new(ClassroomId::new(), "Switching").with_lab(lab);
        let lab_id = project.labs[0].id;

        let mut storage = MemoryStorage::new();
        storage.save_project(&project).await.unwrap();

        for (student, done) in [("alice", true), ("bob", false)] {
            let mut p = Progress::started(ActorId::new(student), project.id, due);
            if done {
                p.status = ProgressStatus::Completed;
                p.percent_complete = 100;
            }
            storage.save_progress(&p).await.unwrap();
        }

        // alice: attempt 1 graded 20, attempt 2 graded 45; bob: one late attempt graded 30
        for (student, attempt, grade, offset) in [("alice", 1, 20.0, -2), ("alice", 2, 45.0, -1), ("bob", 1, 30.0, 3)] {
            let mut s = LabSubmission::draft(ActorId::new(student), lab_id, project.id, attempt, Some(due), due);
            s.status = SubmissionStatus::Graded;
            s.submitted_at = Some(due + Duration::hours(offset));
            s.grade = Some(grade);
            storage.save_submission(&s).await.unwrap();
        }

        (AggregationEngine::new(storage), project)
    }

    #[tokio::test]
    async fn test_project_stats_for_staff() {
        let (engine, project) = seeded().await;
        let stats = engine.project_stats(&Actor::instructor("prof"), project.id).await.unwrap();

        assert_eq!(stats.progress.total(), 2);
        assert_eq!(stats.progress.completion_rate, 50.0);
        assert_eq!(stats.submissions.total(), 3);
        assert_eq!(stats.submissions.late_count, 1);
        assert!((stats.submissions.average_grade - 95.0 / 3.0).abs() < 1e-9);
        // 45/50 = 90%
        assert_eq!(stats.submissions.score_distribution[9].count, 1);
    }

    #[tokio::test]
    async fn test_project_stats_scoped_for_student() {
        let (engine, project) = seeded().await;
        let stats = engine.project_stats(&Actor::student("bob"), project.id).await.unwrap();

        assert_eq!(stats.progress.total(), 1);
        assert_eq!(stats.progress.completion_rate, 0.0);
        assert_eq!(stats.submissions.total(), 1);
        assert_eq!(stats.submissions.average_grade, 30.0);
    }

    #[tokio::test]
    async fn test_lab_stats_latest_attempts() {
        let (engine, project) = seeded().await;
        let lab_id = project.labs[0].id;
        let stats = engine.lab_stats(&Actor::administrator("root"), lab_id).await.unwrap();

        assert_eq!(stats.project_id, project.id);
        assert_eq!(stats.students, 2);
        assert_eq!(stats.submissions.total(), 3);
        assert_eq!(stats.latest.total(), 2);
        assert_eq!(stats.latest.average_grade, 37.5);
    }

    #[tokio::test]
    async fn test_student_stats_access() {
        let (engine, _) = seeded().await;
        let alice = Actor::student("alice");

        let own = engine.student_submission_stats(&alice, &alice.id).await.unwrap();
        assert_eq!(own.total(), 2);
        assert_eq!(own.average_grade, 32.5);

        let err = engine
            .student_submission_stats(&alice, &ActorId::new("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "PermissionDenied");
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let (engine, _) = seeded().await;
        let prof = Actor::instructor("prof");
        assert_eq!(engine.project_stats(&prof, ProjectId::new()).await.unwrap_err().kind(), "NotFound");
        assert_eq!(engine.lab_stats(&prof, LabId::new()).await.unwrap_err().kind(), "NotFound");
    }

    #[tokio::test]
    async fn test_stats_need_permission() {
        let (engine, project) = seeded().await;
        let muted = Actor::student("guest").with_permissions([labman_core::Permission::ViewProgress]);
        let err = engine.project_stats(&muted, project.id).await.unwrap_err();
        assert_eq!(err.kind(), "PermissionDenied");
    }
}
