//! Errors raised by snapshot construction and copy-and-mutate operations.

use std::fmt;

/// Which entity type an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Category,
    Tag,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Category => f.write_str("category"),
            EntityKind::Tag => f.write_str("tag"),
        }
    }
}

/// Every failure is raised synchronously to the caller of the operation;
/// nothing here is retried.
///
/// Ids are carried as raw `u32` so one variant can describe both entity kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("{kind} stored with the unset id 0")]
    ZeroId { kind: EntityKind },

    #[error("{kind} id {id} appears more than once")]
    DuplicateId { kind: EntityKind, id: u32 },

    #[error("tag {tag} references missing category {category}")]
    MissingCategory { tag: u32, category: u32 },

    #[error("tag {tag} implies missing tag {implied}")]
    DanglingImpliedTag { tag: u32, implied: u32 },

    #[error("{kind} name '{name}' is already used by {kind} {conflicting_id}")]
    DuplicateName {
        kind: EntityKind,
        name: String,
        conflicting_id: u32,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u32 },

    #[error("{kind} {id} is still referenced by tags {blockers:?}")]
    ReferentialIntegrity {
        kind: EntityKind,
        id: u32,
        blockers: Vec<u32>,
    },

    #[error("{kind} already has id {id}; create expects an unset id")]
    IdAlreadySet { kind: EntityKind, id: u32 },

    #[error("{kind} ids are exhausted: the maximum id 4294967295 is already taken")]
    IdSpaceExhausted { kind: EntityKind },

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: EntityKind,
        name: String,
        reason: &'static str,
    },
}

impl GraphError {
    /// True for broken references and ids: data that no sequence of valid
    /// mutations could have produced.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GraphError::ZeroId { .. }
                | GraphError::DuplicateId { .. }
                | GraphError::MissingCategory { .. }
                | GraphError::DanglingImpliedTag { .. }
        )
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_entity() {
        let err = GraphError::ReferentialIntegrity {
            kind: EntityKind::Category,
            id: 3,
            blockers: vec![7, 8],
        };
        assert_eq!(
            err.to_string(),
            "category 3 is still referenced by tags [7, 8]"
        );

        let err = GraphError::DuplicateName {
            kind: EntityKind::Tag,
            name: "Foo".to_string(),
            conflicting_id: 4,
        };
        assert_eq!(err.to_string(), "tag name 'Foo' is already used by tag 4");
    }

    #[test]
    fn validation_errors_are_classified() {
        assert!(GraphError::ZeroId {
            kind: EntityKind::Tag
        }
        .is_validation());
        assert!(!GraphError::NotFound {
            kind: EntityKind::Tag,
            id: 1
        }
        .is_validation());
    }
}
