//! Error taxonomy shared by every lifecycle operation.

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds a lifecycle operation can report.
///
/// Each operation fails with exactly one of these; none of them is retried
/// internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Unknown entity id or foreign-key mismatch
    #[error("Not found: {0}")]
    NotFound(String),

    /// AccessGate rejected the actor
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// State machine edge not in the transition table
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State the record is in
        from: String,
        /// State (or operation) that was requested
        to: String,
    },

    /// Score outside `0..=max_grade`
    #[error("Invalid grade {grade}: must be between 0 and {max_grade}")]
    InvalidGrade {
        /// Requested score
        grade: f64,
        /// Lab maximum
        max_grade: f64,
    },

    /// Concurrent write detected by the version check
    #[error("Conflict on {entity}: expected version {expected}, found {actual}")]
    Conflict {
        /// Entity description
        entity: String,
        /// Version the writer based its change on
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Persistence collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::InvalidTransition { .. } => "InvalidTransition",
            Error::InvalidGrade { .. } => "InvalidGrade",
            Error::Conflict { .. } => "Conflict",
            Error::Storage(_) => "Storage",
        }
    }

    /// Shorthand for an `InvalidTransition` built from displayable states.
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Fail with `Conflict` when a caller-supplied version no longer matches.
    pub fn ensure_version(entity: impl std::fmt::Display, expected: Option<u64>, actual: u64) -> Result<()> {
        match expected {
            Some(expected) if expected != actual => Err(Error::Conflict {
                entity: entity.to_string(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}
