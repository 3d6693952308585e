//! Error types for registry model construction.

use thiserror::Error;

use super::EntityKind;

/// Errors raised while building or resolving the registry model.
///
/// All of these are structural: the registry cannot be turned into output.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown type '{name}' referenced by '{referenced_by}'")]
    UnknownType { name: String, referenced_by: String },

    #[error("Duplicate registry entry: {0}")]
    DuplicateEntity(String),

    #[error("'{name}' is a {found}, expected a {expected}")]
    KindMismatch {
        name: String,
        expected: EntityKind,
        found: EntityKind,
    },
}

impl ModelError {
    pub(crate) fn unknown(name: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Self::UnknownType {
            name: name.into(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Returns `true` if a type name could not be resolved.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType { .. })
    }
}
