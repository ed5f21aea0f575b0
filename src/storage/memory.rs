//! In-memory event store
//!
//! A complete `BackingStore` held in process memory:
//! - Write path: mutation → interned record update → filter-scoped notification
//! - Read path: filter → decode tags → match → materialize record
//!
//! Every mutation publishes its notification while still holding the store
//! lock, so subscribers observe changes in the order they were applied.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{HubConfig, Notification, NotificationHub};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::intern::{Interner, StringTable, SymbolId};
use crate::storage::store::{BackingStore, Subscription};
use crate::storage::types::{Event, EventId, Filter, Record, Sample, Timeseries};
use crate::tagset::{Tag, Tagset};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// First id handed out (default: 1)
    pub first_id: u64,
    /// Notification hub settings
    pub hub: HubConfig,
    /// Trace every published notification
    pub log_notifications: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            first_id: 1,
            hub: HubConfig::default(),
            log_notifications: false,
        }
    }
}

/// Interned (name, value) pair
type StoredTag = (SymbolId, Option<SymbolId>);

#[derive(Debug, Clone)]
struct StoredRecord {
    start: f64,
    end: f64,
    tags: Vec<StoredTag>,
    series: Option<StoredSeries>,
}

#[derive(Debug, Clone)]
struct StoredSeries {
    dimension: usize,
    /// Ordered by time
    samples: Vec<Sample>,
}

impl StoredRecord {
    fn dimension(&self) -> Option<usize> {
        self.series.as_ref().map(|s| s.dimension)
    }

    fn truncate_samples(&mut self) {
        let (start, end) = (self.start, self.end);
        if let Some(series) = &mut self.series {
            series.samples.retain(|s| s.time >= start && s.time <= end);
        }
    }
}

struct StoreState {
    next_id: u64,
    records: BTreeMap<EventId, StoredRecord>,
}

/// The in-memory store
pub struct MemoryStore {
    config: StoreConfig,
    interner: Arc<dyn Interner>,
    state: RwLock<StoreState>,
    hub: NotificationHub,
    /// Cleared to simulate an unreachable store
    online: AtomicBool,
}

/// Store statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub events: usize,
    pub timeseries: usize,
    pub samples: usize,
    pub subscriptions: usize,
    pub symbols: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Events: {}, Timeseries: {}, Samples: {}, Subscriptions: {}, Symbols: {}",
            self.events, self.timeseries, self.samples, self.subscriptions, self.symbols
        )
    }
}

fn check_range(start: f64, end: f64) -> StorageResult<()> {
    // Also rejects NaN
    if start <= end {
        Ok(())
    } else {
        Err(StorageError::InvalidTimeRange { start, end })
    }
}

impl MemoryStore {
    /// Create a store with its own string table
    pub fn new(config: StoreConfig) -> Self {
        Self::with_interner(config, Arc::new(StringTable::new()))
    }

    /// Create a store using a shared interning service
    pub fn with_interner(config: StoreConfig, interner: Arc<dyn Interner>) -> Self {
        Self {
            hub: NotificationHub::new(config.hub.clone()),
            state: RwLock::new(StoreState {
                next_id: config.first_id,
                records: BTreeMap::new(),
            }),
            interner,
            config,
            online: AtomicBool::new(true),
        }
    }

    pub fn interner(&self) -> &Arc<dyn Interner> {
        &self.interner
    }

    /// Take the store offline (every call fails) or back online
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        tracing::info!(online, "Store availability changed");
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("store is offline".to_string()))
        }
    }

    /// Create a plain event
    pub async fn create_event(&self, start: f64, end: f64, tagset: Tagset) -> StorageResult<EventId> {
        self.insert(start, end, tagset, None).await
    }

    /// Create an empty timeseries of the given dimension
    pub async fn create_timeseries(
        &self,
        start: f64,
        end: f64,
        tagset: Tagset,
        dimension: usize,
    ) -> StorageResult<EventId> {
        let series = StoredSeries {
            dimension,
            samples: Vec::new(),
        };
        self.insert(start, end, tagset, Some(series)).await
    }

    async fn insert(
        &self,
        start: f64,
        end: f64,
        tagset: Tagset,
        series: Option<StoredSeries>,
    ) -> StorageResult<EventId> {
        self.ensure_online()?;
        check_range(start, end)?;

        let stored = StoredRecord {
            start,
            end,
            tags: self.encode_tags(&tagset)?,
            series,
        };

        let mut state = self.state.write().await;
        let id = EventId(state.next_id);
        state.next_id += 1;

        let record = self.materialize(id, &stored, tagset, None);
        state.records.insert(id, stored);

        tracing::debug!(event_id = %id, timeseries = record.is_timeseries(), "Created event");
        self.publish(Notification::Added { record: record.clone() }, None, Some(&record))
            .await;
        Ok(id)
    }

    /// Delete an event
    pub async fn remove(&self, id: EventId) -> StorageResult<()> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let stored = state
            .records
            .remove(&id)
            .ok_or(StorageError::EventNotFound(id))?;

        let before = self.materialize(id, &stored, self.decode_tags(&stored.tags)?, Some(0));
        tracing::debug!(event_id = %id, "Removed event");
        self.publish(Notification::Removed { id }, Some(&before), None)
            .await;
        Ok(())
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get store statistics
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let mut stats = StoreStats {
            events: state.records.len(),
            subscriptions: self.hub.subscription_count().await,
            symbols: self.interner.len(),
            ..StoreStats::default()
        };
        for stored in state.records.values() {
            if let Some(series) = &stored.series {
                stats.timeseries += 1;
                stats.samples += series.samples.len();
            }
        }
        stats
    }

    fn encode_tags(&self, tagset: &Tagset) -> StorageResult<Vec<StoredTag>> {
        tagset
            .iter()
            .map(|tag| {
                let name = self.interner.intern(&tag.name)?;
                let value = match &tag.value {
                    Some(v) => Some(self.interner.intern(v)?),
                    None => None,
                };
                Ok((name, value))
            })
            .collect()
    }

    fn decode_tags(&self, tags: &[StoredTag]) -> StorageResult<Tagset> {
        tags.iter()
            .map(|&(name, value)| {
                Ok(Tag {
                    name: self.interner.resolve(name)?,
                    value: value.map(|v| self.interner.resolve(v)).transpose()?,
                })
            })
            .collect()
    }

    /// Build the public record; keeps only the newest `max_samples` samples
    fn materialize(
        &self,
        id: EventId,
        stored: &StoredRecord,
        tagset: Tagset,
        max_samples: Option<usize>,
    ) -> Record {
        let event = Event::new(id, stored.start, stored.end, tagset);
        match &stored.series {
            None => Record::Event(event),
            Some(series) => {
                let keep = max_samples.unwrap_or(usize::MAX).min(series.samples.len());
                let samples = series.samples[series.samples.len() - keep..].to_vec();
                Record::Timeseries(Timeseries::new(event, series.dimension).with_samples(samples))
            }
        }
    }

    async fn publish(&self, notification: Notification, before: Option<&Record>, after: Option<&Record>) {
        let delivered = self.hub.publish(&notification, before, after).await;
        if self.config.log_notifications {
            match notification.to_json() {
                Ok(payload) => tracing::trace!(
                    event_id = %notification.id(),
                    kind = notification.kind(),
                    delivered,
                    payload = %payload,
                    "Published notification"
                ),
                Err(e) => tracing::warn!(
                    event_id = %notification.id(),
                    error = %e,
                    "Failed to encode notification"
                ),
            }
        }
    }

    /// Shared body of `set_start` / `set_end`
    async fn set_time(&self, id: EventId, start: Option<f64>, end: Option<f64>) -> StorageResult<()> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let stored = state
            .records
            .get_mut(&id)
            .ok_or(StorageError::EventNotFound(id))?;

        let new_start = start.unwrap_or(stored.start);
        let new_end = end.unwrap_or(stored.end);
        check_range(new_start, new_end)?;

        let tagset = self.decode_tags(&stored.tags)?;
        let before = self.materialize(id, stored, tagset.clone(), Some(0));

        stored.start = new_start;
        stored.end = new_end;
        stored.truncate_samples();
        let after = self.materialize(id, stored, tagset, Some(0));

        self.publish(
            Notification::TimeChanged {
                id,
                start: new_start,
                end: new_end,
            },
            Some(&before),
            Some(&after),
        )
        .await;
        Ok(())
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn query(&self, filter: &Filter, max_samples: Option<usize>) -> StorageResult<Vec<Record>> {
        self.ensure_online()?;
        let state = self.state.read().await;

        let mut results = Vec::new();
        for (&id, stored) in &state.records {
            let tagset = self.decode_tags(&stored.tags)?;
            if filter.matches_parts(id, stored.start, stored.end, &tagset, stored.dimension()) {
                results.push(self.materialize(id, stored, tagset, max_samples));
            }
        }

        tracing::debug!(filter = %filter, matched = results.len(), "Snapshot query");
        Ok(results)
    }

    async fn fetch(&self, id: EventId, max_samples: Option<usize>) -> StorageResult<Option<Record>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        match state.records.get(&id) {
            Some(stored) => {
                let tagset = self.decode_tags(&stored.tags)?;
                Ok(Some(self.materialize(id, stored, tagset, max_samples)))
            }
            None => Ok(None),
        }
    }

    async fn subscribe(&self, filter: Filter) -> StorageResult<Subscription> {
        self.ensure_online()?;
        let (id, receiver) = self.hub.register(filter).await?;
        Ok(Subscription { id, receiver })
    }

    async fn unsubscribe(&self, id: &str) -> StorageResult<()> {
        self.hub.unregister(id).await?;
        Ok(())
    }

    async fn set_tags(&self, id: EventId, tagset: Tagset) -> StorageResult<()> {
        self.ensure_online()?;
        let encoded = self.encode_tags(&tagset)?;

        let mut state = self.state.write().await;
        let stored = state
            .records
            .get_mut(&id)
            .ok_or(StorageError::EventNotFound(id))?;

        let before = self.materialize(id, stored, self.decode_tags(&stored.tags)?, Some(0));
        stored.tags = encoded;
        let after = self.materialize(id, stored, tagset.clone(), Some(0));

        self.publish(
            Notification::TagsChanged { id, tagset },
            Some(&before),
            Some(&after),
        )
        .await;
        Ok(())
    }

    async fn set_start(&self, id: EventId, start: f64) -> StorageResult<()> {
        self.set_time(id, Some(start), None).await
    }

    async fn set_end(&self, id: EventId, end: f64) -> StorageResult<()> {
        self.set_time(id, None, Some(end)).await
    }

    async fn append_samples(&self, id: EventId, samples: Vec<Sample>) -> StorageResult<()> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let stored = state
            .records
            .get_mut(&id)
            .ok_or(StorageError::EventNotFound(id))?;

        let series = stored
            .series
            .as_mut()
            .ok_or(StorageError::NotTimeseries(id))?;

        // Validate the whole batch before touching anything
        if let Some(bad) = samples.iter().find(|s| s.value.len() != series.dimension) {
            return Err(StorageError::DimensionMismatch {
                id,
                expected: series.dimension,
                actual: bad.value.len(),
            });
        }

        for sample in &samples {
            let pos = series.samples.partition_point(|s| s.time <= sample.time);
            series.samples.insert(pos, sample.clone());
        }

        let record = self.materialize(id, stored, self.decode_tags(&stored.tags)?, Some(0));
        self.publish(
            Notification::DataAdded { id, samples },
            Some(&record),
            Some(&record),
        )
        .await;
        Ok(())
    }
}
