//! Errors in the library.
use thiserror::Error;

/// Errors raised by [`PriorityTree`](crate::PriorityTree) and
/// [`PriorityMemory`](crate::PriorityMemory).
///
/// All of them are caller errors. An operation returning one of these
/// leaves the tree and the stored transitions unchanged.
#[derive(Error, Debug, PartialEq)]
pub enum PerError {
    /// Capacity must be at least one.
    #[error("Invalid capacity: capacity must be positive")]
    InvalidCapacity,

    /// The memory cannot serve the request in its current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Indices and errors given to an update have different lengths.
    #[error("Length mismatch: {indices} indices, {errors} errors")]
    LengthMismatch {
        /// Number of indices.
        indices: usize,

        /// Number of errors.
        errors: usize,
    },

    /// Index does not point to a leaf of the tree.
    #[error("Invalid leaf index: {0}")]
    InvalidIndex(usize),

    /// A configuration value is out of its domain.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
