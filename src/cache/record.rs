//! Live cached records
//!
//! A `LiveRecord` is a shared handle to one cache entry. Every clone sees the
//! same entry, so a caller holding a handle observes notification updates
//! and local write-through mutations as soon as they are applied.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::coordinate::{self, TimeCoordinate};
use crate::cache::error::{CacheError, CacheResult};
use crate::storage::{BackingStore, EventId, Record, Sample};
use crate::tagset::Tagset;

/// Settings shared by a cache and every record it hands out
pub(crate) struct WriteContext {
    pub(crate) store: Arc<dyn BackingStore>,
    pub(crate) coordinate: Option<Arc<dyn TimeCoordinate>>,
    pub(crate) max_samples: Option<usize>,
    /// Set once the owning cache disconnects
    closed: AtomicBool,
}

impl WriteContext {
    pub(crate) fn new(
        store: Arc<dyn BackingStore>,
        coordinate: Option<Arc<dyn TimeCoordinate>>,
        max_samples: Option<usize>,
    ) -> Self {
        Self {
            store,
            coordinate,
            max_samples,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Disconnected)
        } else {
            Ok(())
        }
    }

    /// Native record → presentation form with sample retention applied
    pub(crate) fn present(&self, record: Record) -> Record {
        let mut record = match &self.coordinate {
            Some(c) => coordinate::present_record(c.as_ref(), record),
            None => record,
        };
        self.retain(&mut record);
        record
    }

    pub(crate) fn retain(&self, record: &mut Record) {
        if let (Some(max), Some(ts)) = (self.max_samples, record.as_timeseries_mut()) {
            ts.retain_newest(max);
        }
    }

    pub(crate) fn present_time(&self, t: f64) -> f64 {
        self.coordinate.as_ref().map_or(t, |c| c.to_presentation(t))
    }

    pub(crate) fn native_time(&self, t: f64) -> f64 {
        self.coordinate.as_ref().map_or(t, |c| c.to_native(t))
    }

    pub(crate) fn present_tags(&self, tagset: Tagset) -> Tagset {
        match &self.coordinate {
            Some(c) => c.present_tags(tagset),
            None => tagset,
        }
    }

    pub(crate) fn native_tags(&self, tagset: Tagset) -> Tagset {
        match &self.coordinate {
            Some(c) => c.native_tags(tagset),
            None => tagset,
        }
    }

    pub(crate) fn present_sample(&self, sample: Sample) -> Sample {
        match &self.coordinate {
            Some(c) => coordinate::present_sample(c.as_ref(), sample),
            None => sample,
        }
    }

    fn native_sample(&self, sample: Sample) -> Sample {
        match &self.coordinate {
            Some(c) => coordinate::native_sample(c.as_ref(), sample),
            None => sample,
        }
    }
}

/// Pending echoes kept per record; the oldest are dropped beyond this
const MAX_PENDING_ECHOES: usize = 1024;

/// Cached state of one record
pub(crate) struct Entry {
    /// In presentation form
    pub(crate) record: Record,
    /// Locally appended samples (native form) whose DataAdded echo is pending
    echoes: VecDeque<Sample>,
}

impl Entry {
    fn expect_echoes(&mut self, samples: &[Sample]) {
        self.echoes.extend(samples.iter().cloned());
        let excess = self.echoes.len().saturating_sub(MAX_PENDING_ECHOES);
        self.echoes.drain(..excess);
    }

    /// Withdraw echoes for a batch the store rejected
    fn forget_echoes(&mut self, samples: &[Sample]) {
        for sample in samples {
            if let Some(pos) = self.echoes.iter().rposition(|e| e == sample) {
                self.echoes.remove(pos);
            }
        }
    }

    /// Consume the pending echo for `sample`, if it is the next one expected
    pub(crate) fn take_echo(&mut self, sample: &Sample) -> bool {
        if self.echoes.front() == Some(sample) {
            self.echoes.pop_front();
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn pending_echoes(&self) -> usize {
        self.echoes.len()
    }
}

/// Shared, live handle to a cached record
#[derive(Clone)]
pub struct LiveRecord {
    id: EventId,
    /// Fixed for the record's lifetime
    dimension: Option<usize>,
    pub(crate) entry: Arc<RwLock<Entry>>,
    context: Arc<WriteContext>,
}

impl fmt::Debug for LiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveRecord")
            .field("id", &self.id)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl LiveRecord {
    /// Wrap a record that is already in presentation form
    pub(crate) fn new(record: Record, context: Arc<WriteContext>) -> Self {
        Self {
            id: record.id(),
            dimension: record.dimension(),
            entry: Arc::new(RwLock::new(Entry {
                record,
                echoes: VecDeque::new(),
            })),
            context,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn is_timeseries(&self) -> bool {
        self.dimension.is_some()
    }

    /// Sample dimension, `None` for a plain event
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Check if both handles refer to the same cache entry
    pub fn ptr_eq(&self, other: &LiveRecord) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> Record {
        self.entry.read().await.record.clone()
    }

    pub async fn tagset(&self) -> Tagset {
        self.entry.read().await.record.tagset().clone()
    }

    pub async fn start(&self) -> f64 {
        self.entry.read().await.record.event().start
    }

    pub async fn end(&self) -> f64 {
        self.entry.read().await.record.event().end
    }

    /// Cached samples (empty for a plain event)
    pub async fn samples(&self) -> Vec<Sample> {
        self.entry
            .read()
            .await
            .record
            .as_timeseries()
            .map(|ts| ts.samples.clone())
            .unwrap_or_default()
    }

    /// Replace the tagset in the store, then locally
    pub async fn set_tags(&self, tagset: Tagset) -> CacheResult<()> {
        self.context.ensure_open()?;
        let native = self.context.native_tags(tagset.clone());
        self.context.store.set_tags(self.id, native).await?;

        self.entry.write().await.record.event_mut().tagset = tagset;
        tracing::debug!(event_id = %self.id, "Tags written through");
        Ok(())
    }

    /// Move the start in the store, then locally; samples before it are dropped
    pub async fn set_start(&self, start: f64) -> CacheResult<()> {
        self.context.ensure_open()?;
        self.context
            .store
            .set_start(self.id, self.context.native_time(start))
            .await?;

        let mut entry = self.entry.write().await;
        let end = entry.record.event().end;
        entry.record.set_times(start, end);
        Ok(())
    }

    /// Move the end in the store, then locally; samples after it are dropped
    pub async fn set_end(&self, end: f64) -> CacheResult<()> {
        self.context.ensure_open()?;
        self.context
            .store
            .set_end(self.id, self.context.native_time(end))
            .await?;

        let mut entry = self.entry.write().await;
        let start = entry.record.event().start;
        entry.record.set_times(start, end);
        Ok(())
    }

    /// Append samples in the store, then locally
    ///
    /// The whole batch is rejected if any sample has the wrong dimension.
    /// The store's DataAdded echo for these samples is skipped when it
    /// arrives. No lock is held while the store call is in flight.
    pub async fn append_samples(&self, samples: Vec<Sample>) -> CacheResult<()> {
        self.context.ensure_open()?;
        let dimension = self.dimension.ok_or(CacheError::NotTimeseries(self.id))?;
        if let Some(bad) = samples.iter().find(|s| s.value.len() != dimension) {
            return Err(CacheError::DimensionMismatch {
                id: self.id,
                expected: dimension,
                actual: bad.value.len(),
            });
        }

        let native: Vec<Sample> = samples
            .iter()
            .cloned()
            .map(|s| self.context.native_sample(s))
            .collect();

        // Registered first: the echo can be delivered before the store call returns
        self.entry.write().await.expect_echoes(&native);
        if let Err(e) = self.context.store.append_samples(self.id, native.clone()).await {
            self.entry.write().await.forget_echoes(&native);
            return Err(e.into());
        }

        let mut entry = self.entry.write().await;
        if let Some(ts) = entry.record.as_timeseries_mut() {
            for sample in samples {
                ts.insert_sample(sample);
            }
        }
        self.context.retain(&mut entry.record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Event, Timeseries};

    fn entry() -> Entry {
        let ts = Timeseries::new(Event::unbounded(EventId(1), Tagset::new()), 1);
        Entry {
            record: Record::from(ts),
            echoes: VecDeque::new(),
        }
    }

    #[test]
    fn test_echoes_match_in_order() {
        let mut entry = entry();
        let (a, b) = (Sample::scalar(1.0, 1.0), Sample::scalar(2.0, 2.0));
        entry.expect_echoes(&[a.clone(), b.clone()]);

        assert!(!entry.take_echo(&b));
        assert!(entry.take_echo(&a));
        assert!(entry.take_echo(&b));
        assert!(!entry.take_echo(&a));
        assert_eq!(entry.pending_echoes(), 0);
    }

    #[test]
    fn test_pending_echoes_are_capped() {
        let mut entry = entry();
        let batch: Vec<Sample> = (0..MAX_PENDING_ECHOES + 10)
            .map(|i| Sample::scalar(i as f64, 0.0))
            .collect();
        entry.expect_echoes(&batch);

        assert_eq!(entry.pending_echoes(), MAX_PENDING_ECHOES);
        // The oldest were dropped, so matching resumes at the eleventh
        assert!(!entry.take_echo(&batch[0]));
        assert!(entry.take_echo(&batch[10]));
    }

    #[test]
    fn test_rejected_batch_withdraws_echoes() {
        let mut entry = entry();
        let kept = Sample::scalar(1.0, 1.0);
        let rejected = Sample::scalar(2.0, 2.0);
        entry.expect_echoes(&[kept.clone()]);
        entry.expect_echoes(&[rejected.clone()]);
        entry.forget_echoes(&[rejected]);

        assert_eq!(entry.pending_echoes(), 1);
        assert!(entry.take_echo(&kept));
    }
}
