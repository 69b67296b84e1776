//! Core identifier types with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifier of a remote time entry, as returned by the ledger.
    EntryId, "entry ID"
);

define_string_id!(
    /// Identifier of the organization member that owns created entries.
    MemberId, "member ID"
);

define_string_id!(
    /// Identifier of a remote project.
    ProjectId, "project ID"
);

/// The project a span of time is attributed to.
///
/// Keys compare by exact identity of the mapped project id. An unmapped
/// workspace resolves to [`ProjectKey::Unassigned`], which is a distinct,
/// valid key of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ProjectKey {
    #[default]
    Unassigned,
    Project(ProjectId),
}

impl ProjectKey {
    /// Builds a key from an optional project id.
    pub fn from_project_id(id: Option<ProjectId>) -> Self {
        id.map_or(Self::Unassigned, Self::Project)
    }

    /// The project id to send to the ledger, if any.
    pub const fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Unassigned => None,
            Self::Project(id) => Some(id),
        }
    }

    pub const fn is_unassigned(&self) -> bool {
        matches!(self, Self::Unassigned)
    }
}

impl From<ProjectId> for ProjectKey {
    fn from(id: ProjectId) -> Self {
        Self::Project(id)
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => f.write_str("(no project)"),
            Self::Project(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_reject_blank_values() {
        assert_eq!(
            EntryId::new(""),
            Err(ValidationError::Empty { field: "entry ID" })
        );
        assert!(ProjectId::new("   ").is_err());
        assert!(MemberId::new("m-1").is_ok());
    }

    #[test]
    fn project_key_from_missing_id_is_unassigned() {
        let key = ProjectKey::from_project_id(None);
        assert!(key.is_unassigned());
        assert_eq!(key.project_id(), None);
        assert_eq!(key.to_string(), "(no project)");
    }

    #[test]
    fn project_keys_compare_by_identity() {
        let a = ProjectKey::from(ProjectId::new("proj-a").unwrap());
        let a_again = ProjectKey::from(ProjectId::new("proj-a").unwrap());
        let b = ProjectKey::from(ProjectId::new("proj-b").unwrap());
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_ne!(a, ProjectKey::Unassigned);
    }

    #[test]
    fn id_deserialization_rejects_empty() {
        let parsed: Result<EntryId, _> = serde_json::from_str(r#""""#);
        assert!(parsed.is_err());
        let parsed: EntryId = serde_json::from_str(r#""entry-9""#).unwrap();
        assert_eq!(parsed.as_str(), "entry-9");
    }

    #[test]
    fn project_keys_sort_unassigned_first_then_by_id() {
        let mut keys = vec![
            ProjectKey::Project(ProjectId::new("beta").unwrap()),
            ProjectKey::Unassigned,
            ProjectKey::Project(ProjectId::new("alpha").unwrap()),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ProjectKey::Unassigned,
                ProjectKey::Project(ProjectId::new("alpha").unwrap()),
                ProjectKey::Project(ProjectId::new("beta").unwrap()),
            ]
        );
    }
}
