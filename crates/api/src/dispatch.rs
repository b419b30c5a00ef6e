//! Routes requests to the lifecycle services.

use std::sync::Arc;
use labman_access::{AccessGate, Action};
use labman_core::{Actor, Classroom, Clock, Error, Project, Result};
use labman_progress::{BasicProgressTracker, ProgressTracker};
use labman_stats::AggregationEngine;
use labman_storage::{JsonStorage, Storage};
use labman_submission::{BasicSubmissionService, SubmissionService};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use crate::config::LabmanConfig;
use crate::error::ApiError;
use crate::request::{ApiResponse, Request, Response};

/// Entry point for request-shaped operations.
pub struct LabmanApi<S: Storage> {
    storage: Arc<Mutex<S>>,
    progress: BasicProgressTracker<S>,
    submissions: BasicSubmissionService<S>,
    stats: AggregationEngine<S>,
}

impl LabmanApi<JsonStorage> {
    /// Open JSON storage at the configured path.
    pub async fn open(config: &LabmanConfig) -> Result<Self> {
        let storage = JsonStorage::new(&config.storage_path).await?;
        Ok(Self::new(storage, config))
    }
}

impl<S: Storage + 'static> LabmanApi<S> {
    /// Build the services over one shared storage handle.
    pub fn new(storage: S, config: &LabmanConfig) -> Self {
        let storage = Arc::new(Mutex::new(storage));
        Self {
            progress: BasicProgressTracker::shared(Arc::clone(&storage)),
            submissions: BasicSubmissionService::shared(Arc::clone(&storage))
                .with_config(config.lifecycle.clone()),
            stats: AggregationEngine::shared(Arc::clone(&storage)),
            storage,
        }
    }

    /// Use `clock` for every timestamp.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.progress = self.progress.with_clock(Arc::clone(&clock));
        self.submissions = self.submissions.with_clock(clock);
        self
    }

    /// Progress service.
    pub fn progress(&self) -> &BasicProgressTracker<S> {
        &self.progress
    }

    /// Submission service.
    pub fn submissions(&self) -> &BasicSubmissionService<S> {
        &self.submissions
    }

    /// Statistics engine.
    pub fn stats(&self) -> &AggregationEngine<S> {
        &self.stats
    }

    /// Handle one request on behalf of `actor`.
    pub async fn handle(&self, actor: &Actor, request: Request) -> std::result::Result<Response, ApiError> {
        let op = request.op();
        debug!(actor = %actor.id, role = %actor.role, op, "handling request");

        self.dispatch(actor, request).await.map_err(|e| {
            warn!(actor = %actor.id, op, kind = e.kind(), error = %e, "request failed");
            ApiError::from(e)
        })
    }

    /// Parse a JSON request and wrap the outcome in an envelope.
    pub async fn handle_json(&self, actor: &Actor, raw: &str) -> ApiResponse {
        let outcome = match serde_json::from_str::<Request>(raw) {
            Ok(request) => self.handle(actor, request).await,
            Err(e) => Err(ApiError::from(e)),
        };
        outcome.into()
    }

    async fn dispatch(&self, actor: &Actor, request: Request) -> Result<Response> {
        let response = match request {
            Request::StartProject {
                student_id,
                project_id,
            } => Response::Progress(self.progress.start_project(actor, &student_id, project_id).await?),

            Request::CompleteSection {
                progress_id,
                section_index,
                expected_version,
            } => Response::Progress(
                self.progress
                    .complete_section(actor, progress_id, section_index, expected_version)
                    .await?,
            ),

            Request::VisitSection {
                progress_id,
                section_index,
            } => Response::Progress(self.progress.visit_section(actor, progress_id, section_index).await?),

            Request::CompleteTask { progress_id, task_id } => {
                Response::Progress(self.progress.complete_task(actor, progress_id, task_id).await?)
            }

            Request::CompleteVerification {
                progress_id,
                verification_id,
            } => Response::Progress(
                self.progress
                    .complete_verification(actor, progress_id, verification_id)
                    .await?,
            ),

            Request::ResetProgress {
                progress_id,
                expected_version,
            } => Response::Progress(self.progress.reset_progress(actor, progress_id, expected_version).await?),

            Request::GetProgress {
                student_id,
                project_id,
            } => Response::Progress(self.progress.get_progress(actor, &student_id, project_id).await?),

            Request::CreateDraft { lab_id, student_id } => {
                Response::Submission(self.submissions.create_draft(actor, &student_id, lab_id).await?)
            }

            Request::UpdateContent {
                submission_id,
                content,
                expected_version,
            } => Response::Submission(
                self.submissions
                    .update_content(actor, submission_id, content, expected_version)
                    .await?,
            ),

            Request::AttachFile {
                submission_id,
                name,
                url,
                expected_version,
            } => Response::Submission(
                self.submissions
                    .attach_file(actor, submission_id, name, url, expected_version)
                    .await?,
            ),

            Request::SubmitLab { lab_id, student_id } => {
                Response::Submission(self.submissions.submit_latest_draft(actor, &student_id, lab_id).await?)
            }

            Request::GradeSubmission {
                submission_id,
                grade,
                feedback,
                expected_version,
            } => Response::Submission(
                self.submissions
                    .grade(actor, submission_id, grade, feedback, expected_version)
                    .await?,
            ),

            Request::ListAttempts { student_id, lab_id } => {
                Response::Attempts(self.submissions.list_attempts(actor, &student_id, lab_id).await?)
            }

            Request::ProjectStats { project_id } => {
                Response::ProjectStats(self.stats.project_stats(actor, project_id).await?)
            }

            Request::LabStats { lab_id } => Response::LabStats(self.stats.lab_stats(actor, lab_id).await?),

            Request::StudentStats { student_id } => {
                Response::SubmissionStats(self.stats.student_submission_stats(actor, &student_id).await?)
            }

            Request::ImportCurriculum { classroom, project } => self.import_curriculum(actor, classroom, project).await?,
        };

        Ok(response)
    }

    /// Store a curriculum tree.
    ///
    /// A project already on record may only be re-imported with changed
    /// publication statuses. A classroom keeps the projects it already owns.
    async fn import_curriculum(&self, actor: &Actor, classroom: Option<Classroom>, project: Project) -> Result<Response> {
        AccessGate::authorize(actor, Action::ManageCurriculum)?;
        project.validate()?;

        let mut storage = self.storage.lock().await;
        if let Some(stored) = storage.load_project(project.id).await? {
            if !stored.differs_only_in_status(&project) {
                warn!(project = %project.id, "refusing to restructure an existing project");
                return Err(Error::invalid_transition(format!("project {}", project.id), "restructure"));
            }
        }

        if let Some(mut classroom) = classroom {
            if let Some(stored) = storage.load_classroom(classroom.id).await? {
                for id in stored.projects {
                    if !classroom.projects.contains(&id) {
                        classroom.projects.push(id);
                    }
                }
            }
            if !classroom.projects.contains(&project.id) {
                classroom.projects.push(project.id);
            }
            storage.save_classroom(&classroom).await?;
        }
        storage.save_project(&project).await?;

        debug!(project = %project.id, labs = project.labs.len(), "curriculum imported");
        Ok(Response::Imported {
            project_id: project.id,
            labs: project.labs.len(),
            sections: project.total_sections(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use labman_core::{ClassroomId, FixedClock, Lab, NodeStatus, Section, SubmissionStatus};
    use labman_storage::MemoryStorage;

    fn curriculum() -> Project {
        Project::new(ClassroomId::new(), "Networking 101").with_lab(
            Lab::new("Addressing")
                .with_due_date(Utc::now() + Duration::days(3))
                .with_section(Section::new("Subnets"))
                .with_section(Section::new("Gateways")),
        )
    }

    async fn api_with(project: &Project) -> LabmanApi<MemoryStorage> {
        let api = LabmanApi::new(MemoryStorage::new(), &LabmanConfig::default())
            .with_clock(Arc::new(FixedClock::new(Utc::now())));
        let admin = Actor::administrator("root");
        api.handle(
            &admin,
            Request::ImportCurriculum {
                classroom: None,
                project: project.clone(),
            },
        )
        .await
        .unwrap();
        api
    }

    #[tokio::test]
    async fn test_import_requires_manage_curriculum() {
        let api = LabmanApi::new(MemoryStorage::new(), &LabmanConfig::default());
        let err = api
            .handle(
                &Actor::instructor("prof"),
                Request::ImportCurriculum {
                    classroom: None,
                    project: curriculum(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, "PermissionDenied");
    }

    #[tokio::test]
    async fn test_progress_through_requests() {
        let project = curriculum();
        let api = api_with(&project).await;
        let alice = Actor::student("alice");

        let started = match api
            .handle(
                &alice,
                Request::StartProject {
                    student_id: alice.id.clone(),
                    project_id: project.id,
                },
            )
            .await
            .unwrap()
        {
            Response::Progress(p) => p,
            other => panic!("Wrong response: {:?}", other),
        };

        let updated = api
            .handle(
                &alice,
                Request::CompleteSection {
                    progress_id: started.id,
                    section_index: 1,
                    expected_version: Some(started.version),
                },
            )
            .await
            .unwrap();
        match updated {
            Response::Progress(p) => assert_eq!(p.percent_complete, 50),
            other => panic!("Wrong response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_and_grade_through_json() {
        let project = curriculum();
        let lab_id = project.labs[0].id;
        let api = api_with(&project).await;
        let alice = Actor::student("alice");
        let prof = Actor::instructor("prof");

        api.progress().start_project(&alice, &alice.id, project.id).await.unwrap();
        api.submissions().create_draft(&alice, &alice.id, lab_id).await.unwrap();

        let raw = format!(r#"{{"op":"submissions/submit","lab_id":"{}","student_id":"alice"}}"#, lab_id);
        let reply = api.handle_json(&alice, &raw).await;
        let submitted = match reply.result {
            Some(Response::Submission(s)) => s,
            other => panic!("Wrong response: {:?}", other),
        };
        assert_eq!(submitted.status, SubmissionStatus::Submitted);

        let raw = format!(
            r#"{{"op":"submissions/grade","submission_id":"{}","grade":101,"feedback":"Too generous"}}"#,
            submitted.id
        );
        let reply = api.handle_json(&prof, &raw).await;
        assert!(reply.result.is_none());
        assert_eq!(reply.error.unwrap().kind, "InvalidGrade");
    }

    #[tokio::test]
    async fn test_reimport_cannot_restructure_project() {
        let project = Project::new(ClassroomId::new(), "Routing").with_lab(
            Lab::new("OSPF")
                .with_section(Section::new("Areas"))
                .with_section(Section::new("Neighbors"))
                .with_section(Section::new("LSAs"))
                .with_section(Section::new("Costs")),
        );
        let api = api_with(&project).await;
        let admin = Actor::administrator("root");
        let alice = Actor::student("alice");

        let started = api.progress().start_project(&alice, &alice.id, project.id).await.unwrap();
        api.progress().complete_section(&alice, started.id, 2, None).await.unwrap();
        api.progress().complete_section(&alice, started.id, 3, None).await.unwrap();

        let mut truncated = project.clone();
        truncated.labs[0].sections.truncate(2);
        let err = api
            .handle(
                &admin,
                Request::ImportCurriculum {
                    classroom: None,
                    project: truncated,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, "InvalidTransition");

        let progress = api.progress().complete_section(&alice, started.id, 0, None).await.unwrap();
        assert_eq!(progress.percent_complete, 75);

        // publishing is still allowed
        let mut published = project.clone();
        published.status = NodeStatus::Published;
        let reply = api
            .handle(
                &admin,
                Request::ImportCurriculum {
                    classroom: None,
                    project: published,
                },
            )
            .await
            .unwrap();
        assert!(matches!(reply, Response::Imported { sections: 4, .. }));
    }

    #[tokio::test]
    async fn test_import_rejects_bad_max_grade() {
        let api = LabmanApi::new(MemoryStorage::new(), &LabmanConfig::default());
        let project = Project::new(ClassroomId::new(), "Broken").with_lab(Lab::new("Lab").with_max_grade(f64::NAN));
        let err = api
            .handle(
                &Actor::administrator("root"),
                Request::ImportCurriculum {
                    classroom: None,
                    project,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, "InvalidGrade");
    }

    #[tokio::test]
    async fn test_import_keeps_classroom_projects() {
        let api = LabmanApi::new(MemoryStorage::new(), &LabmanConfig::default());
        let admin = Actor::administrator("root");
        let classroom = Classroom::new("CS 340");
        let first = Project::new(classroom.id, "Switching");
        let second = Project::new(classroom.id, "Routing");

        for project in [first.clone(), second.clone()] {
            api.handle(
                &admin,
                Request::ImportCurriculum {
                    classroom: Some(classroom.clone()),
                    project,
                },
            )
            .await
            .unwrap();
        }

        let stored = api.storage.lock().await.load_classroom(classroom.id).await.unwrap().unwrap();
        assert_eq!(stored.projects, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let api = LabmanApi::new(MemoryStorage::new(), &LabmanConfig::default());
        let reply = api.handle_json(&Actor::student("alice"), "{\"op\": 42}").await;
        assert_eq!(reply.error.unwrap().kind, "BadRequest");
    }
}
