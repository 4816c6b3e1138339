//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input that must stop a pass before any remote call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Two source entities resolved to the same path or external id
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// The remote service rejected a create/update for one entity
    #[error("Remote rejected {identity}: {message}")]
    RemoteRejected { identity: String, message: String },

    /// Remote API failure that is not tied to a single entity
    #[error("Remote API error: {0}")]
    RemoteApi(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error concerns a single entity and the pass may continue.
    ///
    /// Everything else (validation, store, transport) aborts the pass.
    #[must_use]
    pub const fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentity(_) | Self::RemoteRejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_scoped_classification() {
        assert!(Error::DuplicateIdentity("a/b".into()).is_entity_scoped());
        assert!(Error::RemoteRejected {
            identity: "42".into(),
            message: "conflict".into()
        }
        .is_entity_scoped());

        assert!(!Error::Validation("bad window".into()).is_entity_scoped());
        assert!(!Error::RemoteApi("HTTP 500".into()).is_entity_scoped());
        assert!(!Error::NotFound("x".into()).is_entity_scoped());
    }
}
