//! End-to-end lab lifecycle over JSON file storage.

use std::sync::Arc;
use chrono::{Duration, Utc};
use labman_api::{LabmanApi, LabmanConfig, Request, Response};
use labman_core::{
    Actor, ClassroomId, FixedClock, Lab, LabSubmission, Project, Section, SubmissionStatus, Time,
};
use labman_storage::JsonStorage;
use labman_submission::SubmissionService;

struct Course {
    api: LabmanApi<JsonStorage>,
    clock: Arc<FixedClock>,
    project: Project,
    due: Time,
    _dir: tempfile::TempDir,
}

async fn course() -> Course {
    let dir = tempfile::tempdir().unwrap();
    let config = LabmanConfig {
        storage_path: dir.path().join(".labman"),
        ..Default::default()
    };

    let due = Utc::now() + Duration::days(2);
    let project = Project::new(ClassroomId::new(), "Network Fundamentals").with_lab(
        Lab::new("VLAN trunking")
            .with_due_date(due)
            .with_section(Section::new("Access ports"))
            .with_section(Section::new("Trunk ports")),
    );

    let clock = Arc::new(FixedClock::new(due - Duration::days(1)));
    let api = LabmanApi::open(&config).await.unwrap().with_clock(clock.clone());
    api.handle(
        &Actor::administrator("root"),
        Request::ImportCurriculum {
            classroom: None,
            project: project.clone(),
        },
    )
    .await
    .unwrap();

    Course {
        api,
        clock,
        project,
        due,
        _dir: dir,
    }
}

async fn submission(api: &LabmanApi<JsonStorage>, actor: &Actor, request: Request) -> LabSubmission {
    match api.handle(actor, request).await.unwrap() {
        Response::Submission(s) => s,
        other => panic!("Wrong response: {:?}", other),
    }
}

async fn hand_in_at(course: &Course, at: Time) -> LabSubmission {
    let alice = Actor::student("alice");
    let lab_id = course.project.labs[0].id;

    course
        .api
        .handle(
            &alice,
            Request::StartProject {
                student_id: alice.id.clone(),
                project_id: course.project.id,
            },
        )
        .await
        .unwrap();
    let draft = submission(
        &course.api,
        &alice,
        Request::CreateDraft {
            lab_id,
            student_id: alice.id.clone(),
        },
    )
    .await;
    assert_eq!(draft.attempt, 1);
    assert_eq!(draft.status, SubmissionStatus::Draft);

    course.clock.set(at);
    submission(
        &course.api,
        &alice,
        Request::SubmitLab {
            lab_id,
            student_id: alice.id.clone(),
        },
    )
    .await
}

#[tokio::test]
async fn test_on_time_submission_graded() {
    let course = course().await;
    let prof = Actor::instructor("prof");

    let sent = hand_in_at(&course, course.due - Duration::hours(1)).await;
    assert_eq!(sent.status, SubmissionStatus::Submitted);

    let graded = submission(
        &course.api,
        &prof,
        Request::GradeSubmission {
            submission_id: sent.id,
            grade: 92.0,
            feedback: Some("Good".to_string()),
            expected_version: Some(sent.version),
        },
    )
    .await;
    assert_eq!(graded.status, SubmissionStatus::Graded);
    assert_eq!(graded.feedback.as_deref(), Some("Good"));

    let stats = course
        .api
        .handle(
            &prof,
            Request::LabStats {
                lab_id: course.project.labs[0].id,
            },
        )
        .await
        .unwrap();
    match stats {
        Response::LabStats(stats) => {
            assert_eq!(stats.submissions.average_grade, 92.0);
            assert_eq!(stats.submissions.late_count, 0);
        }
        other => panic!("Wrong response: {:?}", other),
    }
}

#[tokio::test]
async fn test_late_submission_still_graded() {
    let course = course().await;
    let prof = Actor::instructor("prof");

    let sent = hand_in_at(&course, course.due + Duration::hours(1)).await;
    assert_eq!(sent.status, SubmissionStatus::Late);

    let graded = submission(
        &course.api,
        &prof,
        Request::GradeSubmission {
            submission_id: sent.id,
            grade: 75.0,
            feedback: None,
            expected_version: None,
        },
    )
    .await;
    assert_eq!(graded.status, SubmissionStatus::Graded);
    assert_eq!(graded.grade, Some(75.0));
}

#[tokio::test]
async fn test_stale_grade_conflicts() {
    let course = course().await;
    let prof = Actor::instructor("prof");
    let head = Actor::administrator("head");

    let sent = hand_in_at(&course, course.due - Duration::hours(3)).await;

    course
        .api
        .submissions()
        .grade(&prof, sent.id, 80.0, None, Some(sent.version))
        .await
        .unwrap();
    let err = course
        .api
        .handle(
            &head,
            Request::GradeSubmission {
                submission_id: sent.id,
                grade: 60.0,
                feedback: None,
                expected_version: Some(sent.version),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, "Conflict");
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_student_cannot_grade_own_work() {
    let course = course().await;
    let alice = Actor::student("alice");
    let sent = hand_in_at(&course, course.due - Duration::hours(1)).await;

    let err = course
        .api
        .handle(
            &alice,
            Request::GradeSubmission {
                submission_id: sent.id,
                grade: 100.0,
                feedback: None,
                expected_version: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, "PermissionDenied");

    let attempts = course
        .api
        .handle(
            &alice,
            Request::ListAttempts {
                student_id: alice.id.clone(),
                lab_id: course.project.labs[0].id,
            },
        )
        .await
        .unwrap();
    match attempts {
        Response::Attempts(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].status, SubmissionStatus::Submitted);
            assert!(list[0].grade.is_none());
        }
        other => panic!("Wrong response: {:?}", other),
    }
}

#[tokio::test]
async fn test_storage_survives_reopen() {
    let course = course().await;
    let alice = Actor::student("alice");
    let sent = hand_in_at(&course, course.due - Duration::hours(1)).await;

    let config = LabmanConfig {
        storage_path: course._dir.path().join(".labman"),
        ..Default::default()
    };
    let reopened = LabmanApi::open(&config).await.unwrap();
    let loaded = reopened.submissions().get(&alice, sent.id).await.unwrap();
    assert_eq!(loaded, sent);
}
