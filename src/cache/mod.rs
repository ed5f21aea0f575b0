//! Tagstore Event Cache
//!
//! A live local mirror of the store records matching a filter:
//!
//! - **engine**: `EventCache` lifecycle, notification handling and queries
//! - **record**: `LiveRecord`, the shared handle to one cached record
//! - **coordinate**: presentation time coordinates
//! - **pipeline**: sort/skip/limit stages for query results
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! init:    Filter → subscribe → snapshot query → populate map → replay buffered
//! live:    Notification → delivery task → map update → CacheChange
//! reads:   Filter(s) → in-memory match → LiveRecord handles
//! writes:  LiveRecord → store (native coordinate) → local update
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagstore::cache::EventCache;
//! use tagstore::storage::{Filter, MemoryStore, StoreConfig};
//! use tagstore::tagset::Tagset;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new(StoreConfig::default()));
//!     store.create_timeseries(0.0, 60.0, Tagset::parse("kind=temp")?, 1).await?;
//!
//!     let cache = EventCache::builder(store.clone(), Filter::parse("kind=temp")?)
//!         .max_samples(100)
//!         .build();
//!     cache.init().await?;
//!
//!     for record in cache.find_timeseries(&[]).await? {
//!         println!("{} has {} samples", record.id(), record.samples().await.len());
//!     }
//!
//!     cache.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod coordinate;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod record;

pub use coordinate::{AffineCoordinate, TimeCoordinate};
pub use engine::{CacheBuilder, CacheChange, CacheState, CacheStats, EventCache};
pub use error::{CacheError, CacheResult};
pub use pipeline::{Pipeline, Stage};
pub use record::LiveRecord;
