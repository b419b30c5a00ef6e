//! Pure progress transitions.
//!
//! Every function takes the current record and returns the next one; nothing
//! here touches storage or logs. Section indices are flat positions in
//! [`Project::sections`].

use labman_core::{
    ActorId, Error, Progress, ProgressStatus, Project, Result, TaskId, Time, VerificationId,
};

/// `round(completed / total * 100)` clamped to 0..=100; 0 when there is nothing to complete.
pub fn percent_complete(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (completed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Open a project.
///
/// A started record is returned unchanged. A record still in NOT_STARTED is
/// moved to IN_PROGRESS. Without a record a new IN_PROGRESS one is created.
pub fn start_project(existing: Option<Progress>, student_id: ActorId, project: &Project, now: Time) -> Progress {
    match existing {
        Some(p) if p.status == ProgressStatus::NotStarted => Progress {
            status: ProgressStatus::InProgress,
            current_section: Some(0),
            started_at: Some(now),
            last_accessed_at: now,
            ..p
        },
        Some(p) => p,
        None => Progress::started(student_id, project.id, now),
    }
}

/// Mark a section complete.
///
/// Completing an already-completed section only refreshes `last_accessed_at`.
/// When the last section is completed the record moves to COMPLETED.
pub fn complete_section(progress: &Progress, project: &Project, index: usize, now: Time) -> Result<Progress> {
    ensure_same_project(progress, project)?;
    ensure_started(progress, "complete_section")?;

    let total = project.total_sections();
    if index >= total {
        return Err(Error::NotFound(format!(
            "section {} in project {} ({} sections)",
            index, project.id, total
        )));
    }

    let mut next = progress.clone();
    next.completed_sections.insert(index);
    next.percent_complete = percent_complete(next.completed_sections.len(), total);
    next.current_section = first_incomplete(&next, total).or(Some(total - 1));
    next.last_accessed_at = now;

    if next.completed_sections.len() == total && next.status.can_transition(ProgressStatus::Completed) {
        next.status = ProgressStatus::Completed;
        next.completed_at = Some(now);
    }

    Ok(next)
}

/// Move the current-section pointer without completing anything.
pub fn visit_section(progress: &Progress, project: &Project, index: usize, now: Time) -> Result<Progress> {
    ensure_same_project(progress, project)?;
    ensure_started(progress, "visit_section")?;

    if index >= project.total_sections() {
        return Err(Error::NotFound(format!("section {} in project {}", index, project.id)));
    }

    let mut next = progress.clone();
    next.current_section = Some(index);
    next.last_accessed_at = now;
    Ok(next)
}

/// Mark a guide task complete. Independent of section completion.
pub fn complete_task(progress: &Progress, project: &Project, task_id: TaskId, now: Time) -> Result<Progress> {
    ensure_same_project(progress, project)?;
    ensure_started(progress, "complete_task")?;

    if !project.contains_task(task_id) {
        return Err(Error::NotFound(format!("task {} in project {}", task_id, project.id)));
    }

    let mut next = progress.clone();
    next.completed_tasks.insert(task_id);
    next.last_accessed_at = now;
    Ok(next)
}

/// Mark a verification step complete. Independent of section completion.
pub fn complete_verification(
    progress: &Progress,
    project: &Project,
    verification_id: VerificationId,
    now: Time,
) -> Result<Progress> {
    ensure_same_project(progress, project)?;
    ensure_started(progress, "complete_verification")?;

    if !project.contains_verification(verification_id) {
        return Err(Error::NotFound(format!(
            "verification {} in project {}",
            verification_id, project.id
        )));
    }

    let mut next = progress.clone();
    next.completed_verifications.insert(verification_id);
    next.last_accessed_at = now;
    Ok(next)
}

/// Clear all completion state after a lab environment reset.
///
/// The only transition that lowers `percent_complete`. A record that was
/// never started stays NOT_STARTED; anything else goes back to IN_PROGRESS.
pub fn reset_progress(progress: &Progress, now: Time) -> Progress {
    let status = match progress.status {
        ProgressStatus::NotStarted => ProgressStatus::NotStarted,
        ProgressStatus::InProgress | ProgressStatus::Completed => ProgressStatus::InProgress,
    };

    Progress {
        status,
        percent_complete: 0,
        current_section: (status == ProgressStatus::InProgress).then_some(0),
        completed_sections: Default::default(),
        completed_tasks: Default::default(),
        completed_verifications: Default::default(),
        completed_at: None,
        last_accessed_at: now,
        ..progress.clone()
    }
}

fn first_incomplete(progress: &Progress, total: usize) -> Option<usize> {
    (0..total).find(|i| !progress.completed_sections.contains(i))
}

fn ensure_same_project(progress: &Progress, project: &Project) -> Result<()> {
    if progress.project_id != project.id {
        return Err(Error::NotFound(format!(
            "project {} for progress {} (belongs to {})",
            project.id, progress.id, progress.project_id
        )));
    }
    Ok(())
}

fn ensure_started(progress: &Progress, operation: &str) -> Result<()> {
    if progress.status == ProgressStatus::NotStarted {
        return Err(Error::invalid_transition(progress.status, operation));
    }
    Ok(())
}
