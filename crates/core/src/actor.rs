//! Actor model - who is performing an action.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::id::ActorId;

/// Role of an authenticated party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Works through labs and submits
    Student,
    /// Grades and reviews
    Instructor,
    /// Manages everything
    Administrator,
}

impl Role {
    /// Whether this role belongs to course staff.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Instructor | Role::Administrator)
    }

    /// Permissions granted to this role unless the caller supplies its own set.
    pub fn default_permissions(&self) -> BTreeSet<Permission> {
        use Permission::*;
        match self {
            Role::Student => [
                ViewProgress,
                UpdateProgress,
                ResetProgress,
                SubmitLab,
                ViewSubmissions,
                ViewStatistics,
            ]
            .into_iter()
            .collect(),
            Role::Instructor => [
                ViewProgress,
                ResetProgress,
                ViewSubmissions,
                GradeSubmission,
                ViewStatistics,
            ]
            .into_iter()
            .collect(),
            Role::Administrator => Permission::all().into_iter().collect(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Instructor => write!(f, "instructor"),
            Role::Administrator => write!(f, "administrator"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "administrator" | "admin" => Ok(Role::Administrator),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A granted capability, independent of role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read progress records
    ViewProgress,
    /// Start projects and complete sections/tasks/verifications
    UpdateProgress,
    /// Reset a lab environment's progress
    ResetProgress,
    /// Create, edit and submit lab submissions
    SubmitLab,
    /// Read submissions and attempt history
    ViewSubmissions,
    /// Grade submitted work
    GradeSubmission,
    /// Read aggregate statistics
    ViewStatistics,
    /// Create and edit curriculum nodes
    ManageCurriculum,
}

impl Permission {
    /// Every permission.
    pub fn all() -> [Permission; 8] {
        use Permission::*;
        [
            ViewProgress,
            UpdateProgress,
            ResetProgress,
            SubmitLab,
            ViewSubmissions,
            GradeSubmission,
            ViewStatistics,
            ManageCurriculum,
        ]
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewProgress => "view_progress",
            Permission::UpdateProgress => "update_progress",
            Permission::ResetProgress => "reset_progress",
            Permission::SubmitLab => "submit_lab",
            Permission::ViewSubmissions => "view_submissions",
            Permission::GradeSubmission => "grade_submission",
            Permission::ViewStatistics => "view_statistics",
            Permission::ManageCurriculum => "manage_curriculum",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::all()
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

/// The authenticated party performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity from the authentication collaborator
    pub id: ActorId,

    /// Role
    pub role: Role,

    /// Granted permissions
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    /// Create an actor carrying its role's default permissions.
    pub fn new(id: impl Into<ActorId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            permissions: role.default_permissions(),
        }
    }

    /// Replace the permission set.
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    /// Student with default permissions.
    pub fn student(id: impl Into<ActorId>) -> Self {
        Self::new(id, Role::Student)
    }

    /// Instructor with default permissions.
    pub fn instructor(id: impl Into<ActorId>) -> Self {
        Self::new(id, Role::Instructor)
    }

    /// Administrator with every permission.
    pub fn administrator(id: impl Into<ActorId>) -> Self {
        Self::new(id, Role::Administrator)
    }

    /// Check a single permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
