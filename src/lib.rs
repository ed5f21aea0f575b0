//! # Tagstore
//!
//! Tag-indexed event store with a live, queryable local cache.
//!
//! ## Features
//!
//! - **Tagset algebra**: subset, intersection, template and permutation matching
//! - **Open classification**: events carry name/value tags instead of a schema
//! - **Live cache**: snapshot plus notifications keep a filtered mirror current
//! - **Bounded memory**: per-timeseries sample retention
//!
//! ## Modules
//!
//! - [`tagset`]: Tags, tagsets and the matching algebra
//! - [`storage`]: Records, filters and the backing store contract
//! - [`notify`]: Change notifications and the subscription hub
//! - [`cache`]: The event cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagstore::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new(StoreConfig::default()));
//!     let id = store.create_event(0.0, 10.0, Tagset::parse("color=red")?).await?;
//!
//!     let cache = EventCache::new(store.clone(), Filter::parse("color=red")?);
//!     cache.init().await?;
//!
//!     if let Some(record) = cache.get(id).await? {
//!         record.set_end(5.0).await?;
//!     }
//!     println!("Cached {} red events", cache.len().await?);
//!
//!     cache.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod logging;
pub mod notify;
pub mod storage;
pub mod tagset;

// Re-export top-level types for convenience
pub use tagset::{Tag, Tagset, TagsetComparator, TagsetError, TagsetResult};

pub use storage::{
    BackingStore, Event, EventId, Filter, MemoryStore, Record, Sample, Schema, StorageError,
    StorageResult, StoreConfig, StoreStats, TimeRange, Timeseries,
};

pub use notify::{HubConfig, HubError, Notification, NotificationHub};

pub use cache::{
    AffineCoordinate, CacheChange, CacheError, CacheResult, CacheState, EventCache, LiveRecord,
    Pipeline, Stage, TimeCoordinate,
};

pub use config::{
    CacheConfig, Config, ConfigError, LoggingConfig, StoreConfig as ConfigStoreConfig,
};
