//! Curriculum model - classrooms, projects, labs and their guides.
//!
//! Ownership runs one way: a project holds its labs by value, a lab its
//! sections, a section its tasks and verification steps. Nodes are
//! immutable once created apart from their [`NodeStatus`].

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::id::{ClassroomId, LabId, ProjectId, SectionId, TaskId, VerificationId};
use crate::Time;

/// Default maximum score for a lab.
pub const DEFAULT_MAX_GRADE: f64 = 100.0;

/// Publication status of a curriculum node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Being authored, hidden from students
    #[default]
    Draft,
    /// Visible to students
    Published,
    /// Kept for history, no longer offered
    Archived,
}

/// A classroom groups the projects offered to one cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classroom {
    /// Unique identifier
    pub id: ClassroomId,

    /// Classroom name
    pub name: String,

    /// Description
    pub description: String,

    /// Projects owned by this classroom
    pub projects: Vec<ProjectId>,

    /// Publication status
    pub status: NodeStatus,

    /// When created
    pub created_at: Time,
}

impl Classroom {
    /// Create an empty classroom.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClassroomId::new(),
            name: name.into(),
            description: String::new(),
            projects: Vec::new(),
            status: NodeStatus::default(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// A project is a sequence of labs with step-by-step guides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,

    /// Owning classroom
    pub classroom_id: ClassroomId,

    /// Project title
    pub title: String,

    /// Description
    pub description: String,

    /// Labs in guide order
    pub labs: Vec<Lab>,

    /// Publication status
    pub status: NodeStatus,

    /// When created
    pub created_at: Time,
}

impl Project {
    /// Create a project with no labs.
    pub fn new(classroom_id: ClassroomId, title: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            classroom_id,
            title: title.into(),
            description: String::new(),
            labs: Vec::new(),
            status: NodeStatus::default(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Append a lab.
    pub fn with_lab(mut self, lab: Lab) -> Self {
        self.labs.push(lab);
        self
    }

    /// Find a lab by id.
    pub fn lab(&self, id: LabId) -> Option<&Lab> {
        self.labs.iter().find(|l| l.id == id)
    }

    /// All sections in guide order (lab order, then section order).
    ///
    /// The position in this iterator is the section index used by progress
    /// tracking.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.labs.iter().flat_map(|l| l.sections.iter())
    }

    /// Section at a flat index.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections().nth(index)
    }

    /// Number of sections across every lab.
    pub fn total_sections(&self) -> usize {
        self.labs.iter().map(|l| l.sections.len()).sum()
    }

    /// Whether a guide task belongs to this project.
    pub fn contains_task(&self, id: TaskId) -> bool {
        self.sections().any(|s| s.tasks.iter().any(|t| t.id == id))
    }

    /// Whether a verification step belongs to this project.
    pub fn contains_verification(&self, id: VerificationId) -> bool {
        self.sections().any(|s| s.verifications.iter().any(|v| v.id == id))
    }

    /// Reject labs whose maximum grade cannot bound a score.
    pub fn validate(&self) -> Result<()> {
        for lab in &self.labs {
            if !lab.max_grade.is_finite() || lab.max_grade <= 0.0 {
                return Err(Error::InvalidGrade {
                    grade: lab.max_grade,
                    max_grade: lab.max_grade,
                });
            }
        }
        Ok(())
    }

    /// Whether `other` is this project with only publication statuses changed.
    pub fn differs_only_in_status(&self, other: &Project) -> bool {
        if self.labs.len() != other.labs.len() {
            return false;
        }
        let mut aligned = other.clone();
        aligned.status = self.status;
        for (lab, stored) in aligned.labs.iter_mut().zip(&self.labs) {
            lab.status = stored.status;
        }
        &aligned == self
    }
}

/// A lab: a graded unit of work inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    /// Unique identifier
    pub id: LabId,

    /// Lab title
    pub title: String,

    /// Description
    pub description: String,

    /// Highest score a submission can receive
    pub max_grade: f64,

    /// Submissions after this instant are late
    pub due_date: Option<Time>,

    /// Guide sections
    pub sections: Vec<Section>,

    /// Publication status
    pub status: NodeStatus,
}

impl Lab {
    /// Create a lab with the default maximum grade and no deadline.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: LabId::new(),
            title: title.into(),
            description: String::new(),
            max_grade: DEFAULT_MAX_GRADE,
            due_date: None,
            sections: Vec::new(),
            status: NodeStatus::default(),
        }
    }

    /// Set the maximum grade.
    pub fn with_max_grade(mut self, max_grade: f64) -> Self {
        self.max_grade = max_grade;
        self
    }

    /// Set the due date.
    pub fn with_due_date(mut self, due: Time) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Append a section.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}

/// One section of a lab guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique identifier
    pub id: SectionId,

    /// Section title
    pub title: String,

    /// Guide content
    pub content: String,

    /// Tasks to carry out
    pub tasks: Vec<GuideTask>,

    /// Checks that confirm the tasks worked
    pub verifications: Vec<VerificationStep>,
}

impl Section {
    /// Create an empty section.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(),
            title: title.into(),
            content: String::new(),
            tasks: Vec::new(),
            verifications: Vec::new(),
        }
    }

    /// Append a task.
    pub fn with_task(mut self, task: GuideTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Append a verification step.
    pub fn with_verification(mut self, step: VerificationStep) -> Self {
        self.verifications.push(step);
        self
    }
}

/// A task inside a guide section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideTask {
    /// Unique identifier
    pub id: TaskId,

    /// Task title
    pub title: String,

    /// Instructions
    pub description: String,
}

impl GuideTask {
    /// Create a task.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: String::new(),
        }
    }
}

/// A check the student runs to confirm a section works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStep {
    /// Unique identifier
    pub id: VerificationId,

    /// What is being verified
    pub description: String,

    /// Command to run on the lab device, if any
    pub command: Option<String>,

    /// Output the command should produce
    pub expected_output: Option<String>,
}

impl VerificationStep {
    /// Create a verification step.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: VerificationId::new(),
            description: description.into(),
            command: None,
            expected_output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> Project {
        Project::new(ClassroomId::new(), "Routing")
            .with_lab(
                Lab::new("Static routes")
                    .with_section(Section::new("Addressing").with_task(GuideTask::new("Assign IPs")))
                    .with_section(Section::new("Routes")),
            )
            .with_lab(
                Lab::new("OSPF").with_section(
                    Section::new("Neighbors").with_verification(VerificationStep::new("show ip ospf neighbor")),
                ),
            )
    }

    #[test]
    fn test_sections_are_flattened_in_lab_order() {
        let project = sample_project();
        assert_eq!(project.total_sections(), 3);
        assert_eq!(project.section(0).unwrap().title, "Addressing");
        assert_eq!(project.section(2).unwrap().title, "Neighbors");
        assert!(project.section(3).is_none());
    }

    #[test]
    fn test_membership_checks() {
        let project = sample_project();
        let task_id = project.labs[0].sections[0].tasks[0].id;
        let verification_id = project.labs[1].sections[0].verifications[0].id;

        assert!(project.contains_task(task_id));
        assert!(!project.contains_task(TaskId::new()));
        assert!(project.contains_verification(verification_id));
        assert!(!project.contains_verification(VerificationId::new()));
    }

    #[test]
    fn test_status_only_changes() {
        let project = sample_project();

        let mut published = project.clone();
        published.status = NodeStatus::Published;
        published.labs[1].status = NodeStatus::Archived;
        assert!(project.differs_only_in_status(&published));

        let mut truncated = project.clone();
        truncated.labs[0].sections.pop();
        assert!(!project.differs_only_in_status(&truncated));

        let mut regraded = project.clone();
        regraded.labs[0].max_grade = 50.0;
        assert!(!project.differs_only_in_status(&regraded));
    }

    #[test]
    fn test_validate_max_grade() {
        assert!(sample_project().validate().is_ok());

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let project = Project::new(ClassroomId::new(), "Bad").with_lab(Lab::new("Lab").with_max_grade(bad));
            assert_eq!(project.validate().unwrap_err().kind(), "InvalidGrade");
        }
    }

    #[test]
    fn test_lab_defaults() {
        let lab = Lab::new("Lab");
        assert_eq!(lab.max_grade, DEFAULT_MAX_GRADE);
        assert!(lab.due_date.is_none());
        assert_eq!(lab.status, NodeStatus::Draft);
    }
}
