use std::collections::TryReserveError;

use thiserror::Error;

/// Allocation failure of a [`Storage`](crate::Storage).
///
/// The storage is left unchanged when an operation returns this error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllocError {
    /// Growing the slot vector or the pending-release queue failed.
    #[error("storage allocation failed: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// Every addressable slot is already in use.
    #[error("storage is full: at most {max} slots can be addressed")]
    TooManySlots {
        /// Maximum number of slots a storage can hold.
        max: usize,
    },
}
