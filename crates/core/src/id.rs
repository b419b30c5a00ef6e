//! Unique identifiers for LabMan entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a fresh identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

ulid_id! {
    /// Unique identifier for a Classroom
    ClassroomId
}

ulid_id! {
    /// Unique identifier for a Project
    ProjectId
}

ulid_id! {
    /// Unique identifier for a Lab
    LabId
}

ulid_id! {
    /// Unique identifier for a guide Section
    SectionId
}

ulid_id! {
    /// Unique identifier for a guide Task
    TaskId
}

ulid_id! {
    /// Unique identifier for a VerificationStep
    VerificationId
}

ulid_id! {
    /// Unique identifier for a Progress record
    ProgressId
}

ulid_id! {
    /// Unique identifier for a LabSubmission
    SubmissionId
}

ulid_id! {
    /// Unique identifier for a SubmissionFile
    FileId
}

/// Identifier of an authenticated party.
///
/// Issued by the authentication collaborator, so it is an opaque string
/// rather than a generated ULID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    /// Create a new actor ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_through_string() {
        let id = LabId::new();
        let parsed: LabId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!("not-a-ulid".parse::<SubmissionId>().is_err());
    }

    #[test]
    fn test_actor_id_serializes_as_plain_string() {
        let id = ActorId::new("student-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"student-7\"");
    }
}
