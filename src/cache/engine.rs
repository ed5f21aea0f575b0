//! Event cache engine
//!
//! Keeps a live, queryable local copy of every store record matching a
//! filter:
//! - `init`: a filter-scoped subscription, then one snapshot query, then a
//!   replay of whatever the subscription buffered meanwhile
//! - A spawned delivery task applies notifications to the map in receipt order
//! - Reads evaluate filters against memory only
//!
//! No lock is held across a store call. Handlers clone a `LiveRecord` out of
//! the map and release the map lock before taking the entry lock; the map
//! write lock is only taken to insert or remove.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use crate::cache::coordinate::TimeCoordinate;
use crate::cache::error::{CacheError, CacheResult};
use crate::cache::pipeline::Pipeline;
use crate::cache::record::{LiveRecord, WriteContext};
use crate::notify::{Notification, SubscriptionId};
use crate::storage::{BackingStore, EventId, Filter, Record, Sample};
use crate::tagset::Tagset;

/// Default capacity of the change broadcast channel
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// Cache lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Active,
    /// Terminal
    Disconnected,
}

/// A change applied to the cached map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheChange {
    Inserted(EventId),
    Updated(EventId),
    Removed(EventId),
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub records: usize,
    pub timeseries: usize,
    pub samples: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, Timeseries: {}, Samples: {}",
            self.records, self.timeseries, self.samples
        )
    }
}

/// Builder for `EventCache`
pub struct CacheBuilder {
    store: Arc<dyn BackingStore>,
    filter: Filter,
    max_samples: Option<usize>,
    coordinate: Option<Arc<dyn TimeCoordinate>>,
    change_capacity: usize,
}

impl CacheBuilder {
    /// Keep at most `n` newest samples per timeseries
    pub fn max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }

    /// Present records in another time coordinate
    pub fn coordinate(self, coordinate: impl TimeCoordinate + 'static) -> Self {
        self.coordinate_arc(Arc::new(coordinate))
    }

    pub fn coordinate_arc(mut self, coordinate: Arc<dyn TimeCoordinate>) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    /// Capacity of the `subscribe_changes` channel
    pub fn change_capacity(mut self, capacity: usize) -> Self {
        self.change_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> EventCache {
        let (changes, _) = broadcast::channel(self.change_capacity);
        EventCache {
            shared: Arc::new(Shared {
                filter: self.filter,
                context: Arc::new(WriteContext::new(
                    self.store,
                    self.coordinate,
                    self.max_samples,
                )),
                state: RwLock::new(MapState {
                    lifecycle: CacheState::Uninitialized,
                    entries: HashMap::new(),
                }),
                changes,
            }),
            delivery: Mutex::new(None),
        }
    }
}

struct MapState {
    lifecycle: CacheState,
    entries: HashMap<EventId, LiveRecord>,
}

/// State shared between the cache and its delivery task
struct Shared {
    filter: Filter,
    context: Arc<WriteContext>,
    state: RwLock<MapState>,
    changes: broadcast::Sender<CacheChange>,
}

struct Delivery {
    subscription: SubscriptionId,
    task: JoinHandle<()>,
}

/// Live local mirror of the store records matching a filter
pub struct EventCache {
    shared: Arc<Shared>,
    /// Also serializes `init` against `disconnect`
    delivery: Mutex<Option<Delivery>>,
}

impl EventCache {
    /// Start building a cache over `store` scoped by `filter`
    pub fn builder(store: Arc<dyn BackingStore>, filter: Filter) -> CacheBuilder {
        CacheBuilder {
            store,
            filter,
            max_samples: None,
            coordinate: None,
            change_capacity: DEFAULT_CHANGE_CAPACITY,
        }
    }

    /// Cache with default settings
    pub fn new(store: Arc<dyn BackingStore>, filter: Filter) -> Self {
        Self::builder(store, filter).build()
    }

    /// Load the snapshot and start following notifications
    ///
    /// All or nothing: on error the cache stays uninitialized and empty.
    pub async fn init(&self) -> CacheResult<()> {
        let mut delivery = self.delivery.lock().await;
        match self.state().await {
            CacheState::Uninitialized => {}
            CacheState::Active => return Err(CacheError::AlreadyInitialized),
            CacheState::Disconnected => return Err(CacheError::Disconnected),
        }

        let context = &self.shared.context;
        let subscription = context.store.subscribe(self.shared.filter.clone()).await?;
        let records = match context
            .store
            .query(&self.shared.filter, context.max_samples)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                if let Err(unsub) = context.store.unsubscribe(&subscription.id).await {
                    tracing::warn!(error = %unsub, "Failed to unsubscribe after init failure");
                }
                return Err(e.into());
            }
        };

        let count = records.len();
        {
            let mut state = self.shared.state.write().await;
            state.entries = records
                .into_iter()
                .map(|record| {
                    let live = LiveRecord::new(context.present(record), Arc::clone(context));
                    (live.id(), live)
                })
                .collect();
            state.lifecycle = CacheState::Active;
        }

        // Buffered while the snapshot loaded; may repeat what it already holds
        let mut receiver = subscription.receiver;
        let mut replayed = 0;
        while let Ok(notification) = receiver.try_recv() {
            self.shared.apply_logged(notification, Replay::CatchUp).await;
            replayed += 1;
        }

        let task = tokio::spawn(deliver(Arc::clone(&self.shared), receiver));
        *delivery = Some(Delivery {
            subscription: subscription.id,
            task,
        });

        tracing::info!(
            filter = %self.shared.filter,
            records = count,
            replayed,
            "Event cache initialized"
        );
        Ok(())
    }

    /// Stop following the store
    ///
    /// Safe to call repeatedly. Every later operation fails with
    /// `CacheError::Disconnected`.
    pub async fn disconnect(&self) {
        let mut delivery = self.delivery.lock().await;
        {
            let mut state = self.shared.state.write().await;
            if state.lifecycle == CacheState::Disconnected {
                return;
            }
            state.lifecycle = CacheState::Disconnected;
            state.entries.clear();
        }
        self.shared.context.close();

        if let Some(active) = delivery.take() {
            active.task.abort();
            if let Err(e) = self
                .shared
                .context
                .store
                .unsubscribe(&active.subscription)
                .await
            {
                tracing::warn!(error = %e, "Failed to unsubscribe");
            }
        }
        tracing::info!(filter = %self.shared.filter, "Event cache disconnected");
    }

    pub async fn state(&self) -> CacheState {
        self.shared.state.read().await.lifecycle
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == CacheState::Active
    }

    /// Scoping filter
    pub fn filter(&self) -> &Filter {
        &self.shared.filter
    }

    /// Receive a `CacheChange` for every applied update
    pub fn subscribe_changes(&self) -> broadcast::Receiver<CacheChange> {
        self.shared.changes.subscribe()
    }

    async fn active(&self) -> CacheResult<RwLockReadGuard<'_, MapState>> {
        let state = self.shared.state.read().await;
        match state.lifecycle {
            CacheState::Active => Ok(state),
            CacheState::Uninitialized => Err(CacheError::NotInitialized),
            CacheState::Disconnected => Err(CacheError::Disconnected),
        }
    }

    /// Number of cached records
    pub async fn len(&self) -> CacheResult<usize> {
        Ok(self.active().await?.entries.len())
    }

    pub async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn get(&self, id: EventId) -> CacheResult<Option<LiveRecord>> {
        Ok(self.active().await?.entries.get(&id).cloned())
    }

    /// One slot per requested id, `None` where the id is not cached
    pub async fn get_events_by_id(&self, ids: &[EventId]) -> CacheResult<Vec<Option<LiveRecord>>> {
        let state = self.active().await?;
        Ok(ids.iter().map(|id| state.entries.get(id).cloned()).collect())
    }

    /// Cached records matching any of `filters` (all records when empty),
    /// ordered by id
    pub async fn find_events(&self, filters: &[Filter]) -> CacheResult<Vec<LiveRecord>> {
        let found = self.matching(filters, false).await?;
        Ok(found.into_iter().map(|(live, _)| live).collect())
    }

    /// Like `find_events`, restricted to timeseries
    pub async fn find_timeseries(&self, filters: &[Filter]) -> CacheResult<Vec<LiveRecord>> {
        let found = self.matching(filters, true).await?;
        Ok(found.into_iter().map(|(live, _)| live).collect())
    }

    /// `find_events` followed by a processing pipeline
    pub async fn query(&self, filters: &[Filter], pipeline: &Pipeline) -> CacheResult<Vec<LiveRecord>> {
        let found = self.matching(filters, false).await?;
        let processed = pipeline.apply(found, |(_, tagset)| tagset)?;
        Ok(processed.into_iter().map(|(live, _)| live).collect())
    }

    async fn matching(
        &self,
        filters: &[Filter],
        timeseries_only: bool,
    ) -> CacheResult<Vec<(LiveRecord, Tagset)>> {
        let state = self.active().await?;
        let mut found = Vec::new();
        for live in state.entries.values() {
            if timeseries_only && !live.is_timeseries() {
                continue;
            }
            let entry = live.entry.read().await;
            if filters.is_empty() || filters.iter().any(|f| f.matches(&entry.record)) {
                found.push((live.clone(), entry.record.tagset().clone()));
            }
        }
        found.sort_by_key(|(live, _)| live.id());
        Ok(found)
    }

    /// Insert a native record locally without waiting for its notification
    ///
    /// Returns the existing handle if the id is already cached; the later
    /// Added notification for the same id is then a no-op.
    pub async fn add_event(&self, record: Record) -> CacheResult<LiveRecord> {
        let mut state = self.shared.state.write().await;
        match state.lifecycle {
            CacheState::Active => {}
            CacheState::Uninitialized => return Err(CacheError::NotInitialized),
            CacheState::Disconnected => return Err(CacheError::Disconnected),
        }

        let id = record.id();
        if let Some(existing) = state.entries.get(&id) {
            return Ok(existing.clone());
        }

        let context = &self.shared.context;
        let live = LiveRecord::new(context.present(record), Arc::clone(context));
        state.entries.insert(id, live.clone());
        self.shared.emit(CacheChange::Inserted(id));
        Ok(live)
    }

    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let state = self.active().await?;
        let mut stats = CacheStats {
            records: state.entries.len(),
            ..CacheStats::default()
        };
        for live in state.entries.values() {
            if live.is_timeseries() {
                stats.timeseries += 1;
                let entry = live.entry.read().await;
                stats.samples += entry.record.as_timeseries().map_or(0, |ts| ts.samples.len());
            }
        }
        Ok(stats)
    }
}

impl Drop for EventCache {
    fn drop(&mut self) {
        if let Some(active) = self.delivery.get_mut().take() {
            active.task.abort();
        }
    }
}

/// Delivery task: apply notifications until the stream ends or is aborted
async fn deliver(shared: Arc<Shared>, mut receiver: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = receiver.recv().await {
        shared.apply_logged(notification, Replay::Live).await;
    }
    tracing::debug!(filter = %shared.filter, "Notification stream closed");
}

/// Where a notification is being applied from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Buffered during `init`; its samples may already be in the snapshot
    CatchUp,
    Live,
}

impl Shared {
    fn emit(&self, change: CacheChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }

    async fn apply_logged(&self, notification: Notification, replay: Replay) {
        let id = notification.id();
        let kind = notification.kind();
        if let Err(e) = self.apply(notification, replay).await {
            tracing::warn!(event_id = %id, kind, error = %e, "Failed to apply notification");
        }
    }

    async fn apply(&self, notification: Notification, replay: Replay) -> CacheResult<()> {
        match notification {
            Notification::Added { record } => self.on_added(record).await,
            Notification::Removed { id } => {
                self.on_removed(id).await;
                Ok(())
            }
            Notification::DataAdded { id, samples } => {
                self.on_data_added(id, samples, replay).await
            }
            Notification::TagsChanged { id, tagset } => self.on_tags_changed(id, tagset).await,
            Notification::TimeChanged { id, start, end } => {
                self.on_time_changed(id, start, end).await
            }
        }
    }

    /// Handle for `id`, with the map lock already released
    async fn cached(&self, id: EventId) -> Option<LiveRecord> {
        self.state.read().await.entries.get(&id).cloned()
    }

    /// Remove `live` unless its slot was replaced in the meantime
    async fn evict(&self, live: &LiveRecord) {
        let id = live.id();
        let mut state = self.state.write().await;
        if state.entries.get(&id).is_some_and(|current| current.ptr_eq(live)) {
            state.entries.remove(&id);
            self.emit(CacheChange::Removed(id));
        }
    }

    /// Insert a native record if it is in scope and not yet cached
    async fn insert_if_absent(&self, record: Record) {
        if !self.filter.matches(&record) {
            return;
        }
        let mut state = self.state.write().await;
        let id = record.id();
        if state.lifecycle != CacheState::Active || state.entries.contains_key(&id) {
            return;
        }
        let live = LiveRecord::new(self.context.present(record), Arc::clone(&self.context));
        state.entries.insert(id, live);
        self.emit(CacheChange::Inserted(id));
    }

    async fn on_added(&self, record: Record) -> CacheResult<()> {
        self.insert_if_absent(record).await;
        Ok(())
    }

    async fn on_removed(&self, id: EventId) {
        if self.state.write().await.entries.remove(&id).is_some() {
            self.emit(CacheChange::Removed(id));
        }
    }

    async fn fetch_and_insert(&self, id: EventId) -> CacheResult<()> {
        let context = &self.context;
        if let Some(record) = context.store.fetch(id, context.max_samples).await? {
            self.insert_if_absent(record).await;
        }
        Ok(())
    }

    async fn on_data_added(&self, id: EventId, samples: Vec<Sample>, replay: Replay) -> CacheResult<()> {
        let Some(live) = self.cached(id).await else {
            return Ok(());
        };

        let dimension = live.dimension().ok_or(CacheError::NotTimeseries(id))?;
        if let Some(bad) = samples.iter().find(|s| s.value.len() != dimension) {
            return Err(CacheError::DimensionMismatch {
                id,
                expected: dimension,
                actual: bad.value.len(),
            });
        }

        let mut guard = live.entry.write().await;
        let entry = &mut *guard;
        let mut fresh = 0;
        for sample in samples {
            if entry.take_echo(&sample) {
                continue;
            }
            let sample = self.context.present_sample(sample);
            let Some(ts) = entry.record.as_timeseries_mut() else {
                return Err(CacheError::NotTimeseries(id));
            };
            if replay == Replay::CatchUp && ts.samples.contains(&sample) {
                continue;
            }
            ts.insert_sample(sample);
            fresh += 1;
        }
        if fresh == 0 {
            return Ok(());
        }

        self.context.retain(&mut entry.record);
        drop(guard);
        self.emit(CacheChange::Updated(id));
        Ok(())
    }

    async fn on_tags_changed(&self, id: EventId, tagset: Tagset) -> CacheResult<()> {
        if let Some(live) = self.cached(id).await {
            let in_scope = {
                let mut entry = live.entry.write().await;
                let start = self.context.native_time(entry.record.event().start);
                let end = self.context.native_time(entry.record.event().end);
                let in_scope = self
                    .filter
                    .matches_parts(id, start, end, &tagset, live.dimension());
                if in_scope {
                    entry.record.event_mut().tagset = self.context.present_tags(tagset);
                }
                in_scope
            };

            if in_scope {
                self.emit(CacheChange::Updated(id));
            } else {
                self.evict(&live).await;
            }
            return Ok(());
        }

        if self.filter.matches_tagset(&tagset) {
            self.fetch_and_insert(id).await?;
        }
        Ok(())
    }

    async fn on_time_changed(&self, id: EventId, start: f64, end: f64) -> CacheResult<()> {
        if let Some(live) = self.cached(id).await {
            let in_scope = {
                let mut entry = live.entry.write().await;
                let tagset = self.context.native_tags(entry.record.tagset().clone());
                let in_scope = self
                    .filter
                    .matches_parts(id, start, end, &tagset, live.dimension());
                if in_scope {
                    let dropped = entry.record.set_times(
                        self.context.present_time(start),
                        self.context.present_time(end),
                    );
                    tracing::trace!(event_id = %id, dropped, "Applied time change");
                }
                in_scope
            };

            if in_scope {
                self.emit(CacheChange::Updated(id));
            } else {
                self.evict(&live).await;
            }
            return Ok(());
        }

        self.fetch_and_insert(id).await
    }
}
