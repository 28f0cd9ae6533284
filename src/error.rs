//! Error taxonomy for the note graph library.
//!
//! Every failure the core can detect locally is expressed as a variant here,
//! before any mutation reaches the database.
use thiserror::Error;

use crate::models::LinkType;

/// Errors that can occur while working with notes, groups, tags and links.
#[derive(Debug, Error)]
pub enum NoteGraphError {
    /// Referenced entity does not exist or belongs to another user.
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Name uniqueness violated within the entity's scope.
    #[error("{entity} with name '{name}' already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// A link with the same (source, target, type) triple exists.
    #[error("Link already exists from note {source_note} to note {target_note} with type {link_type}")]
    DuplicateLink {
        source_note: i64,
        target_note: i64,
        link_type: LinkType,
    },

    /// Moving a group under one of its descendants.
    #[error("Cannot move group {group}: would create circular reference via {new_parent}")]
    CircularReference { group: i64, new_parent: i64 },

    /// Link source equals target.
    #[error("Cannot create self-referencing link on note {note}")]
    SelfLink { note: i64 },

    /// Operation conflicts with the current state (e.g. non-empty group).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NoteGraphError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn duplicate_name(entity: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            entity,
            name: name.into(),
        }
    }

    /// HTTP-equivalent status for the error kind.
    ///
    /// The core never renders errors itself; an outer layer can use this to
    /// pick a response code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::DuplicateName { .. }
            | Self::DuplicateLink { .. }
            | Self::CircularReference { .. }
            | Self::SelfLink { .. }
            | Self::InvalidArgument(_) => 400,
            Self::InvalidState(_) => 409,
            Self::Database(_) | Self::Serialization(_) => 500,
        }
    }

    /// Returns true when the caller can fix the problem by changing input.
    pub fn is_user_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, NoteGraphError>;

/// Returns true if the rusqlite error is a UNIQUE/PRIMARY KEY violation.
///
/// Used to turn the loser of an insert race into a domain error instead of a
/// generic database failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
