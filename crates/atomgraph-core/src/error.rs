//! Error types for atomgraph-core.
//!
//! This module defines the central error type [`CoreError`] used by every
//! atomgraph crate, along with the [`CoreResult<T>`] type alias.
//!
//! # Examples
//!
//! ```rust
//! use atomgraph_core::CoreError;
//!
//! fn lookup_atom(id: u64) -> Result<(), CoreError> {
//!     Err(CoreError::not_found("atom", id))
//! }
//!
//! let result = lookup_atom(7);
//! assert!(matches!(result, Err(CoreError::NotFound { .. })));
//! ```

use thiserror::Error;

/// Top-level error type for atomgraph operations.
///
/// Spatial-index staleness and trilateration approximation error are NOT
/// represented here: they are accepted quality degradations, not failures.
///
/// # Examples
///
/// ```rust
/// use atomgraph_core::CoreError;
///
/// let error = CoreError::DimensionMismatch {
///     expected: 768,
///     actual: 384,
/// };
///
/// match &error {
///     CoreError::DimensionMismatch { expected, actual } => {
///         assert_eq!(*expected, 768);
///         assert_eq!(*actual, 384);
///     }
///     _ => panic!("unexpected variant"),
/// }
///
/// assert!(error.to_string().contains("768"));
/// ```
#[derive(Debug, Error)]
pub enum CoreError {
    /// A requested atom, embedding, landmark set or policy does not exist.
    ///
    /// # When This Occurs
    ///
    /// - Looking up an atom id that was never assigned
    /// - Looking up an atom after reclamation deleted it
    /// - Asking for the active policy of a scope that has none
    ///
    /// Recoverable: the caller decides what absence means.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity ("atom", "embedding", "landmark_set", "policy", ...)
        entity: &'static str,
        /// Identifier rendered for display
        id: String,
    },

    /// Vector dimension disagrees with the configured embedding space.
    ///
    /// Caller error, surfaced immediately, never retried.
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the configured embedding space
        expected: usize,
        /// Dimension of the vector that was provided
        actual: usize,
    },

    /// Digest matched an existing atom but the bytes differ.
    ///
    /// Fatal integrity violation. The affected write is halted and nothing
    /// is retried.
    #[error("Digest collision suspected for {digest} (existing atom {atom_id}): stored content differs")]
    DigestCollisionSuspected {
        /// Hex-encoded content digest
        digest: String,
        /// Atom already stored under the digest
        atom_id: u64,
    },

    /// The overflow payload could not be committed.
    ///
    /// The atom row is written in the same atomic batch, so no partial atom
    /// is ever visible. Safe for the caller to retry.
    #[error("Overflow storage failed for {digest}: {message}")]
    OverflowStorageFailure {
        /// Hex-encoded content digest
        digest: String,
        /// Underlying failure
        message: String,
    },

    /// Generic storage I/O failure. The caller may retry.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// `release` was called on an atom whose reference count is already 0.
    #[error("Reference count underflow for atom {atom_id}")]
    ReferenceUnderflow {
        /// Atom that was over-released
        atom_id: u64,
    },

    /// Stored data failed an integrity check on read.
    ///
    /// # When This Occurs
    ///
    /// - Overflow payload missing for an atom flagged `overflow=true`
    /// - Overflow payload digest disagrees with the inline fingerprint
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// A field value failed validation constraints.
    ///
    /// # When This Occurs
    ///
    /// - NaN or Infinity in a vector component
    /// - Degenerate landmark pair (both poles at the same point)
    /// - Landmark set version not newer than the active one
    #[error("Validation error: {field} - {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Encoding or decoding of a persisted record failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Spatial index operation failed.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Internal error (should never happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`CoreError::ValidationError`].
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether a retry by the caller can reasonably succeed.
    ///
    /// Only plain storage I/O and overflow write failures qualify. Integrity
    /// errors (collisions, corruption) are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_) | Self::OverflowStorageFailure { .. }
        )
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}

/// Result type alias for atomgraph operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CoreError::not_found("atom", 42u64);
        assert_eq!(err.to_string(), "atom not found: 42");
    }

    #[test]
    fn test_collision_display_names_digest_and_atom() {
        let err = CoreError::DigestCollisionSuspected {
            digest: "abcd".to_string(),
            atom_id: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("abcd"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CoreError::StorageError("io".into()).is_retryable());
        assert!(CoreError::OverflowStorageFailure {
            digest: "ff".into(),
            message: "disk full".into(),
        }
        .is_retryable());
        assert!(!CoreError::DigestCollisionSuspected {
            digest: "ff".into(),
            atom_id: 1,
        }
        .is_retryable());
        assert!(!CoreError::IntegrityViolation("x".into()).is_retryable());
        assert!(!CoreError::DimensionMismatch {
            expected: 3,
            actual: 4
        }
        .is_retryable());
    }

    #[test]
    fn test_validation_helper() {
        let err = CoreError::validation("vector", "NaN at index 3");
        assert!(matches!(err, CoreError::ValidationError { .. }));
        assert!(err.to_string().contains("NaN at index 3"));
    }
}
