//! Tagstore Backing Store
//!
//! This module provides the system of record an event cache mirrors:
//!
//! - **types**: Core data structures (Event, Timeseries, Record, Filter)
//! - **store**: The `BackingStore` contract (query, fetch, subscribe, write-through)
//! - **memory**: In-memory `BackingStore` with filter-scoped notifications
//! - **intern**: String interning for stored tag names and values
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Mutation → Validate → Interned record → Notification hub → Subscribers
//!
//! Read Path:
//!   Filter → Decode tags → Match → Materialize (newest N samples)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use tagstore::storage::{BackingStore, Filter, MemoryStore, StoreConfig};
//! use tagstore::tagset::Tagset;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new(StoreConfig::default());
//!
//!     let id = store.create_event(0.0, 60.0, Tagset::parse("color=red")?).await?;
//!     store.set_end(id, 30.0).await?;
//!
//!     let red = store.query(&Filter::parse("color=red")?, None).await?;
//!     println!("Found {} red events", red.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod intern;
pub mod memory;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use intern::{Interner, StringTable, SymbolId};
pub use memory::{MemoryStore, StoreConfig, StoreStats};
pub use store::{BackingStore, Subscription};
pub use types::{Event, EventId, Filter, Record, Sample, Schema, TimeRange, Timeseries};

pub(crate) use types::{lower_bound, upper_bound};
