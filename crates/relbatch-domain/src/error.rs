//! Error types for relationship loading.

use thiserror::Error;

/// Errors surfaced by the batching core.
///
/// The type is `Clone` because one failed dispatch is delivered to every
/// request that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The execution context did not supply a traversal identity.
    #[error("missing traversal identity: {reason}")]
    MissingTraversalId { reason: String },

    /// A traversal identity was reused for a loader of a different shape.
    #[error("loader registered for traversal '{traversal}' has a different key or value type")]
    LoaderTypeMismatch { traversal: String },

    /// A loader was built without a batch fetch function.
    #[error("no batch fetch function configured for {loader}")]
    MissingFetcher { loader: String },

    /// The batch fetch function itself failed.
    #[error("batch fetch failed: {message}")]
    BatchFailed { message: String },

    /// The batch fetch function broke its positional alignment contract.
    #[error("batch fetch returned {actual} results for {expected} keys")]
    ResultCountMismatch { expected: usize, actual: usize },

    /// The dispatch task went away before resolving this key.
    #[error("dispatch ended before key {key} was resolved")]
    DispatchAborted { key: String },

    /// Windowing arguments are out of range.
    #[error("invalid window: {message}")]
    InvalidWindow { message: String },
}

impl LoadError {
    /// Creates a whole-dispatch failure from any displayable error.
    pub fn batch_failed(err: impl std::fmt::Display) -> Self {
        LoadError::BatchFailed {
            message: err.to_string(),
        }
    }

    /// Returns true for errors caused by loader wiring rather than data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LoadError::MissingTraversalId { .. }
                | LoadError::LoaderTypeMismatch { .. }
                | LoadError::MissingFetcher { .. }
        )
    }
}

/// Failure attached to a single record or key position.
///
/// Record errors are isolated: they are logged and the affected key resolves
/// to absent or empty, never to an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RecordError {
    pub message: String,
}

impl RecordError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;
