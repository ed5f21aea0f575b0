//! Backing store contract
//!
//! The operations an `EventCache` needs from the system of record: one
//! snapshot query, single-record fetch, a filter-scoped notification
//! subscription, and write-through mutation of existing records.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::notify::{Notification, SubscriptionId};
use crate::storage::error::StorageResult;
use crate::storage::types::{EventId, Filter, Record, Sample};
use crate::tagset::Tagset;

/// A live notification stream scoped by a filter
///
/// Notifications arrive in the order the store produced them. Dropping the
/// receiver is treated by the store as an implicit unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<Notification>,
}

/// System of record consumed by the event cache
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// All records matching `filter`; a timeseries carries at most its
    /// newest `max_samples` samples (all when `None`)
    async fn query(&self, filter: &Filter, max_samples: Option<usize>)
        -> StorageResult<Vec<Record>>;

    /// One record by id
    async fn fetch(&self, id: EventId, max_samples: Option<usize>)
        -> StorageResult<Option<Record>>;

    /// Start receiving notifications for records matching `filter`
    async fn subscribe(&self, filter: Filter) -> StorageResult<Subscription>;

    /// Stop a subscription
    async fn unsubscribe(&self, id: &str) -> StorageResult<()>;

    async fn set_tags(&self, id: EventId, tagset: Tagset) -> StorageResult<()>;

    async fn set_start(&self, id: EventId, start: f64) -> StorageResult<()>;

    async fn set_end(&self, id: EventId, end: f64) -> StorageResult<()>;

    async fn append_samples(&self, id: EventId, samples: Vec<Sample>) -> StorageResult<()>;
}
