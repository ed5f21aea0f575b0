//! Storage error types
//!
//! Defines all errors that can occur in the backing store layer.

use crate::notify::HubError;
use crate::storage::types::EventId;
use thiserror::Error;

/// Errors that can occur in a backing store
#[derive(Error, Debug)]
pub enum StorageError {
    /// No event with this id exists
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Sample data was written to a plain event
    #[error("Event {0} is not a timeseries")]
    NotTimeseries(EventId),

    /// Sample vector length does not match the timeseries dimension
    #[error("Dimension mismatch for event {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        id: EventId,
        expected: usize,
        actual: usize,
    },

    /// Start time after end time
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: f64, end: f64 },

    /// Interned symbol id is not known to the interner
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(u32),

    /// Store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Notification subscription failed
    #[error("Notification hub error: {0}")]
    Hub(#[from] HubError),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
