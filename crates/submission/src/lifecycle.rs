//! Pure submission lifecycle operations.
//!
//! Each operation validates against [`SubmissionStatus::transition`] and
//! returns the updated record; persistence is the caller's job.

use labman_access::{AccessGate, Action};
use labman_core::{
    Actor, ActorId, Error, FileId, Lab, LabSubmission, ProjectId, Result, SubmissionFile,
    SubmissionStatus, Time,
};

/// Attempt number for the next submission: one past the highest existing.
pub fn next_attempt(existing: &[LabSubmission]) -> u32 {
    existing.iter().map(|s| s.attempt).max().unwrap_or(0) + 1
}

/// Open a new DRAFT attempt.
///
/// `existing` are the student's earlier submissions for this lab.
pub fn create_draft(
    existing: &[LabSubmission],
    student_id: ActorId,
    lab: &Lab,
    project_id: ProjectId,
    now: Time,
) -> LabSubmission {
    LabSubmission::draft(
        student_id,
        lab.id,
        project_id,
        next_attempt(existing),
        lab.due_date,
        now,
    )
}

/// Replace the written content of a draft.
pub fn update_content(submission: &LabSubmission, content: impl Into<String>, now: Time) -> Result<LabSubmission> {
    ensure_editable(submission, "update_content")?;

    let mut next = submission.clone();
    next.content = content.into();
    next.updated_at = now;
    Ok(next)
}

/// Attach a file to a draft.
pub fn attach_file(submission: &LabSubmission, file: SubmissionFile, now: Time) -> Result<LabSubmission> {
    ensure_editable(submission, "attach_file")?;

    let mut next = submission.clone();
    next.files.push(file);
    next.updated_at = now;
    Ok(next)
}

/// Remove an attachment from a draft.
pub fn remove_file(submission: &LabSubmission, file_id: FileId, now: Time) -> Result<LabSubmission> {
    ensure_editable(submission, "remove_file")?;

    let mut next = submission.clone();
    let before = next.files.len();
    next.files.retain(|f| f.id != file_id);
    if next.files.len() == before {
        return Err(Error::NotFound(format!("file {} in submission {}", file_id, submission.id)));
    }
    next.updated_at = now;
    Ok(next)
}

/// Hand in a draft. LATE when `now` is past the due date, SUBMITTED otherwise.
pub fn submit(submission: &LabSubmission, now: Time) -> Result<LabSubmission> {
    let target = match submission.due_date {
        Some(due) if now > due => SubmissionStatus::Late,
        _ => SubmissionStatus::Submitted,
    };

    let mut next = submission.clone();
    next.status = SubmissionStatus::transition(submission.status, target)?;
    next.submitted_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// Score a handed-in submission.
///
/// Checks run in a fixed order: the grader's role, then the status, then the
/// score range. Nothing is changed when any of them fails.
pub fn grade(
    actor: &Actor,
    submission: &LabSubmission,
    lab: &Lab,
    grade: f64,
    feedback: Option<String>,
    now: Time,
) -> Result<LabSubmission> {
    AccessGate::authorize(actor, Action::GradeSubmission)?;

    if lab.id != submission.lab_id {
        return Err(Error::NotFound(format!(
            "lab {} for submission {} (belongs to {})",
            lab.id, submission.id, submission.lab_id
        )));
    }

    let status = SubmissionStatus::transition(submission.status, SubmissionStatus::Graded)?;

    if !grade.is_finite() || grade < 0.0 || grade > lab.max_grade {
        return Err(Error::InvalidGrade {
            grade,
            max_grade: lab.max_grade,
        });
    }

    let mut next = submission.clone();
    next.status = status;
    next.grade = Some(grade);
    next.feedback = feedback;
    next.graded_by = Some(actor.id.clone());
    next.graded_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

fn ensure_editable(submission: &LabSubmission, operation: &str) -> Result<()> {
    if !submission.is_editable() {
        return Err(Error::invalid_transition(submission.status, operation));
    }
    Ok(())
}
