//! Cache error types

use thiserror::Error;

use crate::storage::{EventId, StorageError};
use crate::tagset::TagsetError;

/// Errors that can occur in the event cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// `init` has not completed
    #[error("Cache is not initialized")]
    NotInitialized,

    #[error("Cache is already initialized")]
    AlreadyInitialized,

    /// The cache was disconnected and can no longer be used
    #[error("Cache is disconnected")]
    Disconnected,

    /// Backing store call failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Tagset parsing or comparison failed
    #[error("Tagset error: {0}")]
    Tagset(#[from] TagsetError),

    /// Sample vector length does not match the timeseries dimension
    #[error("Dimension mismatch for event {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        id: EventId,
        expected: usize,
        actual: usize,
    },

    #[error("Event {0} is not a timeseries")]
    NotTimeseries(EventId),

    /// Time coordinate parameters are unusable
    #[error("Invalid time coordinate: {0}")]
    InvalidCoordinate(String),
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
