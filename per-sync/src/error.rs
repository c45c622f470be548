//! Errors in the library.
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors in multi-worker training.
#[derive(Error, Debug, PartialEq)]
pub enum PerSyncError {
    /// Gradients and parameters have different lengths.
    #[error("Length mismatch: {params} parameters, {grads} gradients")]
    LengthMismatch {
        /// Number of parameters.
        params: usize,

        /// Number of gradients.
        grads: usize,
    },

    /// A thread panicked while holding a lock.
    #[error("Poisoned lock: {0}")]
    PoisonedLock(&'static str),

    /// A worker thread panicked.
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Locks `mutex`, turning a poisoned lock into [`PerSyncError::PoisonedLock`].
pub(crate) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    name: &'static str,
) -> Result<MutexGuard<'a, T>, PerSyncError> {
    mutex.lock().map_err(|_| PerSyncError::PoisonedLock(name))
}
