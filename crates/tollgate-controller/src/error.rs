//! Controller error types.

use thiserror::Error;
use tollgate_core::ValidationErrors;

/// Errors returned by a [`ResourceStore`](crate::ResourceStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No task is stored under the key.
    #[error("approval task {0} not found")]
    NotFound(String),

    /// A task is already stored under the key.
    #[error("approval task {0} already exists")]
    AlreadyExists(String),

    /// The write was based on a stale resource version.
    #[error("conflict writing approval task {key}: expected resource version {expected}, found {actual}")]
    Conflict {
        /// Task key.
        key: String,
        /// Version carried by the rejected write.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the reconciler, bootstrap and vote client.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Admission rejected the write.
    #[error("admission denied: {0}")]
    Denied(String),

    /// The principal has neither a user entry nor a group to vote through.
    #[error("{principal} has no vote slot in approval task {task}")]
    NoVoteSlot {
        /// Task key.
        task: String,
        /// Acting username.
        principal: String,
    },

    /// Run parameters could not be turned into a task.
    #[error("{0}")]
    InvalidParams(String),

    /// The built task failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Every attempt hit a concurrent write.
    #[error("gave up on approval task {key} after {attempts} conflicting writes")]
    RetriesExhausted {
        /// Task key.
        key: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A task could not be encoded for admission review.
    #[error("cannot encode approval task: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;
