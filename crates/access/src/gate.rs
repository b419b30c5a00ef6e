//! Role and permission evaluation.

use labman_core::{Actor, ActorId, Error, Permission, Result, Role};
use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Decide whether `actor` may perform an action.
///
/// - `required_permissions`: the actor must hold all of them when `match_all`
///   is true, otherwise at least one.
/// - `required_roles`: the actor's role must be one of them.
/// - When both are given both must pass; when neither is given access is open.
///
/// An empty list counts as not given. Never fails: a missing role or
/// permission is an ordinary `false`.
pub fn can_access(
    actor: &Actor,
    required_permissions: Option<&[Permission]>,
    required_roles: Option<&[Role]>,
    match_all: bool,
) -> bool {
    let permissions_ok = match required_permissions {
        Some(required) if !required.is_empty() => {
            if match_all {
                required.iter().all(|p| actor.has_permission(*p))
            } else {
                required.iter().any(|p| actor.has_permission(*p))
            }
        }
        _ => true,
    };

    let roles_ok = match required_roles {
        Some(roles) if !roles.is_empty() => roles.contains(&actor.role),
        _ => true,
    };

    permissions_ok && roles_ok
}

/// What an action demands of its actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    /// Required permissions
    pub permissions: Vec<Permission>,

    /// Allowed roles
    pub roles: Vec<Role>,

    /// Require every permission instead of any one
    pub match_all: bool,
}

impl AccessRequirement {
    /// No requirement at all.
    pub fn open() -> Self {
        Self::default()
    }

    /// Require every listed permission.
    pub fn all_of(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            roles: Vec::new(),
            match_all: true,
        }
    }

    /// Require at least one listed permission.
    pub fn any_of(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            roles: Vec::new(),
            match_all: false,
        }
    }

    /// Require one of the listed roles.
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add a role restriction.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Evaluate against an actor.
    pub fn is_satisfied_by(&self, actor: &Actor) -> bool {
        can_access(
            actor,
            Some(self.permissions.as_slice()),
            Some(self.roles.as_slice()),
            self.match_all,
        )
    }

    /// Requirement description for error messages.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.permissions.is_empty() {
            let joiner = if self.match_all { " and " } else { " or " };
            let names: Vec<&str> = self.permissions.iter().map(|p| p.as_str()).collect();
            parts.push(format!("permission {}", names.join(joiner)));
        }
        if !self.roles.is_empty() {
            let names: Vec<String> = self.roles.iter().map(|r| r.to_string()).collect();
            parts.push(format!("role {}", names.join(" or ")));
        }
        if parts.is_empty() {
            "nothing".to_string()
        } else {
            parts.join(" with ")
        }
    }
}

/// Authorization entry point for services.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    /// Check `actor` against the requirement of `action`.
    pub fn allows(actor: &Actor, action: Action) -> bool {
        action.requirement().is_satisfied_by(actor)
    }

    /// Like [`AccessGate::allows`], but as a `PermissionDenied` failure.
    pub fn authorize(actor: &Actor, action: Action) -> Result<()> {
        let requirement = action.requirement();
        if requirement.is_satisfied_by(actor) {
            return Ok(());
        }

        tracing::warn!(
            actor = %actor.id,
            role = %actor.role,
            action = action.as_str(),
            "access denied"
        );
        Err(Error::PermissionDenied(format!(
            "{} ({}) may not {}: requires {}",
            actor.id,
            actor.role,
            action.as_str(),
            requirement.describe()
        )))
    }

    /// Authorize an action on records owned by `student_id`.
    ///
    /// Students are limited to their own records; staff may act on anyone's.
    pub fn authorize_for_student(actor: &Actor, action: Action, student_id: &ActorId) -> Result<()> {
        Self::authorize(actor, action)?;

        if actor.role == Role::Student && &actor.id != student_id {
            tracing::warn!(
                actor = %actor.id,
                owner = %student_id,
                action = action.as_str(),
                "cross-student access denied"
            );
            return Err(Error::PermissionDenied(format!(
                "{} may not {} for another student",
                actor.id,
                action.as_str()
            )));
        }

        Ok(())
    }
}
