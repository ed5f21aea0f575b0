//! Core data types for the event store
//!
//! This module defines the records the store holds and the filters used to
//! select them:
//! - `Event`: an identified time interval carrying a tagset
//! - `Timeseries`: an event with an ordered, fixed-dimension sample buffer
//! - `Record`: either of the above
//! - `TimeRange` and `Schema`: secondary filter constraints
//! - `Filter`: an OR of tagset patterns ANDed with the constraints

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::tagset::{format_tagsets, parse_tagsets, Tagset, TagsetResult};

/// Store-assigned event identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One timeseries sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample time in seconds
    pub time: f64,
    /// Sample vector, length equals the timeseries dimension
    pub value: Vec<f64>,
}

impl Sample {
    pub fn new(time: f64, value: Vec<f64>) -> Self {
        Self { time, value }
    }

    /// One-dimensional sample
    pub fn scalar(time: f64, value: f64) -> Self {
        Self {
            time,
            value: vec![value],
        }
    }
}

/// An identified time interval annotated with a tagset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Start time in seconds, may be `-inf`
    #[serde(with = "lower_bound")]
    pub start: f64,
    /// End time in seconds, may be `+inf`
    #[serde(with = "upper_bound")]
    pub end: f64,
    pub tagset: Tagset,
}

impl Event {
    pub fn new(id: EventId, start: f64, end: f64, tagset: Tagset) -> Self {
        Self {
            id,
            start,
            end,
            tagset,
        }
    }

    /// Event spanning all of time
    pub fn unbounded(id: EventId, tagset: Tagset) -> Self {
        Self::new(id, f64::NEG_INFINITY, f64::INFINITY, tagset)
    }

    /// Check if `time` falls within `[start, end]`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// An event with an ordered buffer of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    pub event: Event,
    pub dimension: usize,
    /// Ordered by time; equal times allowed
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl Timeseries {
    pub fn new(event: Event, dimension: usize) -> Self {
        Self {
            event,
            dimension,
            samples: Vec::new(),
        }
    }

    /// Builder: set initial samples
    pub fn with_samples(mut self, samples: Vec<Sample>) -> Self {
        self.samples = samples;
        self
    }

    /// Keep only the newest `max` samples, returning how many were dropped
    pub fn retain_newest(&mut self, max: usize) -> usize {
        let excess = self.samples.len().saturating_sub(max);
        self.samples.drain(..excess);
        excess
    }

    /// Drop samples outside `[start, end]`, returning how many were dropped
    pub fn truncate_to_bounds(&mut self) -> usize {
        let before = self.samples.len();
        let event = &self.event;
        self.samples.retain(|s| event.contains(s.time));
        before - self.samples.len()
    }

    /// Insert in time order, after any samples with an equal time
    pub fn insert_sample(&mut self, sample: Sample) {
        let pos = self.samples.partition_point(|s| s.time <= sample.time);
        self.samples.insert(pos, sample);
    }
}

/// Anything the store holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Event(Event),
    Timeseries(Timeseries),
}

impl Record {
    pub fn id(&self) -> EventId {
        self.event().id
    }

    pub fn event(&self) -> &Event {
        match self {
            Record::Event(event) => event,
            Record::Timeseries(ts) => &ts.event,
        }
    }

    pub fn event_mut(&mut self) -> &mut Event {
        match self {
            Record::Event(event) => event,
            Record::Timeseries(ts) => &mut ts.event,
        }
    }

    pub fn tagset(&self) -> &Tagset {
        &self.event().tagset
    }

    pub fn is_timeseries(&self) -> bool {
        matches!(self, Record::Timeseries(_))
    }

    pub fn as_timeseries(&self) -> Option<&Timeseries> {
        match self {
            Record::Timeseries(ts) => Some(ts),
            Record::Event(_) => None,
        }
    }

    pub fn as_timeseries_mut(&mut self) -> Option<&mut Timeseries> {
        match self {
            Record::Timeseries(ts) => Some(ts),
            Record::Event(_) => None,
        }
    }

    /// Sample dimension, `None` for a plain event
    pub fn dimension(&self) -> Option<usize> {
        self.as_timeseries().map(|ts| ts.dimension)
    }

    /// Update start/end; a timeseries drops samples now out of bounds
    ///
    /// Returns the number of samples dropped.
    pub fn set_times(&mut self, start: f64, end: f64) -> usize {
        let event = self.event_mut();
        event.start = start;
        event.end = end;
        match self {
            Record::Timeseries(ts) => ts.truncate_to_bounds(),
            Record::Event(_) => 0,
        }
    }
}

impl From<Event> for Record {
    fn from(event: Event) -> Self {
        Record::Event(event)
    }
}

impl From<Timeseries> for Record {
    fn from(ts: Timeseries) -> Self {
        Record::Timeseries(ts)
    }
}

/// Closed time interval used as a filter constraint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Create a new time range
    ///
    /// # Panics
    /// Panics if start > end
    pub fn new(start: f64, end: f64) -> Self {
        assert!(start <= end, "TimeRange: start must not be after end");
        Self { start, end }
    }

    /// Create a time range, returning None if invalid
    pub fn try_new(start: f64, end: f64) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Check if a time falls within this range
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    /// Check if `[start, end]` overlaps this range
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        start <= self.end && end >= self.start
    }
}

/// Record shape constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Plain events only
    Event,
    /// Timeseries, optionally of a given dimension
    Timeseries { dimension: Option<usize> },
}

impl Schema {
    /// Check a record's dimension (`None` = plain event) against this schema
    pub fn admits(&self, dimension: Option<usize>) -> bool {
        match (self, dimension) {
            (Schema::Event, None) => true,
            (Schema::Timeseries { dimension: None }, Some(_)) => true,
            (Schema::Timeseries { dimension: Some(want) }, Some(have)) => *want == have,
            _ => false,
        }
    }
}

/// Record filter
///
/// A record matches when its tagset is a superset of at least one pattern
/// (or there are no patterns) and every optional constraint holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Tagset patterns, OR'd
    pub patterns: Vec<Tagset>,
    /// Restrict to these ids
    pub ids: Option<BTreeSet<EventId>>,
    /// Restrict to events overlapping this range
    pub time: Option<TimeRange>,
    /// Restrict to a record shape
    pub schema: Option<Schema>,
}

impl Filter {
    /// Filter matching every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `;`-separated patterns (`color=red;color=blue`)
    pub fn parse(text: &str) -> TagsetResult<Self> {
        Ok(Self {
            patterns: parse_tagsets(text)?,
            ..Self::default()
        })
    }

    /// Builder: add an OR'd pattern
    pub fn pattern(mut self, pattern: Tagset) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Builder: restrict to ids
    pub fn ids(mut self, ids: impl IntoIterator<Item = EventId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Builder: restrict to a time range
    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time = Some(range);
        self
    }

    /// Builder: restrict to a record shape
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Tagset part of the filter only
    pub fn matches_tagset(&self, tagset: &Tagset) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_subset_of(tagset))
    }

    /// Check a record described by its parts
    pub fn matches_parts(
        &self,
        id: EventId,
        start: f64,
        end: f64,
        tagset: &Tagset,
        dimension: Option<usize>,
    ) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&id) {
                return false;
            }
        }

        if let Some(range) = &self.time {
            if !range.overlaps(start, end) {
                return false;
            }
        }

        if let Some(schema) = &self.schema {
            if !schema.admits(dimension) {
                return false;
            }
        }

        self.matches_tagset(tagset)
    }

    /// Check if a record matches this filter
    pub fn matches(&self, record: &Record) -> bool {
        let event = record.event();
        self.matches_parts(
            event.id,
            event.start,
            event.end,
            &event.tagset,
            record.dimension(),
        )
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_tagsets(&self.patterns))
    }
}

/// Serializes `-inf` (or any non-finite start) as `null`
pub(crate) mod lower_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Serializes `+inf` (or any non-finite end) as `null`
pub(crate) mod upper_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(text: &str) -> Tagset {
        Tagset::parse(text).unwrap()
    }

    fn series(samples: &[f64]) -> Timeseries {
        Timeseries::new(Event::unbounded(EventId(1), tc("kind=temp")), 1)
            .with_samples(samples.iter().map(|&t| Sample::scalar(t, t * 10.0)).collect())
    }

    #[test]
    fn test_retain_newest() {
        let mut ts = series(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ts.retain_newest(2), 2);
        let times: Vec<f64> = ts.samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![3.0, 4.0]);
        assert_eq!(ts.retain_newest(10), 0);
    }

    #[test]
    fn test_insert_sample_keeps_time_order() {
        let mut ts = series(&[2.0, 5.0]);
        ts.insert_sample(Sample::scalar(3.0, 0.0));
        ts.insert_sample(Sample::scalar(1.0, 0.0));
        ts.insert_sample(Sample::scalar(5.0, 1.0));
        let times: Vec<f64> = ts.samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0, 5.0, 5.0]);
        // Equal times keep arrival order
        assert_eq!(ts.samples[4].value, vec![1.0]);

        // Retention then keeps the newest by time, not by arrival
        ts.insert_sample(Sample::scalar(0.5, 0.0));
        ts.retain_newest(2);
        let times: Vec<f64> = ts.samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![5.0, 5.0]);
    }

    #[test]
    fn test_set_times_truncates_both_ends() {
        let mut record = Record::from(series(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(record.set_times(2.0, 4.0), 2);
        let times: Vec<f64> = record
            .as_timeseries()
            .unwrap()
            .samples
            .iter()
            .map(|s| s.time)
            .collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
        assert_eq!(record.event().start, 2.0);
        assert_eq!(record.event().end, 4.0);
    }

    #[test]
    fn test_time_range() {
        let range = TimeRange::new(10.0, 20.0);
        assert!(range.contains(10.0));
        assert!(range.contains(20.0));
        assert!(!range.contains(20.5));
        assert!(range.overlaps(5.0, 10.0));
        assert!(range.overlaps(f64::NEG_INFINITY, f64::INFINITY));
        assert!(!range.overlaps(21.0, 30.0));
        assert!(TimeRange::try_new(2.0, 1.0).is_none());
    }

    #[test]
    fn test_schema_admits() {
        assert!(Schema::Event.admits(None));
        assert!(!Schema::Event.admits(Some(1)));
        assert!(Schema::Timeseries { dimension: None }.admits(Some(3)));
        assert!(Schema::Timeseries { dimension: Some(3) }.admits(Some(3)));
        assert!(!Schema::Timeseries { dimension: Some(2) }.admits(Some(3)));
        assert!(!Schema::Timeseries { dimension: None }.admits(None));
    }

    #[test]
    fn test_filter_patterns_are_ored() {
        let filter = Filter::parse("color=red;color=blue,size").unwrap();
        let red = Record::from(Event::unbounded(EventId(1), tc("color=red")));
        let blue = Record::from(Event::unbounded(EventId(2), tc("color=blue")));
        let blue_sized = Record::from(Event::unbounded(EventId(3), tc("color=blue,size=s")));

        assert!(filter.matches(&red));
        assert!(!filter.matches(&blue));
        assert!(filter.matches(&blue_sized));
        assert_eq!(filter.to_string(), "color=red;color=blue,size");
    }

    #[test]
    fn test_filter_constraints_are_anded() {
        let record = Record::from(Event::new(EventId(5), 100.0, 200.0, tc("color=red")));

        assert!(Filter::new().matches(&record));
        assert!(Filter::new().ids([EventId(5)]).matches(&record));
        assert!(!Filter::new().ids([EventId(6)]).matches(&record));
        assert!(Filter::new()
            .time_range(TimeRange::new(150.0, 300.0))
            .matches(&record));
        assert!(!Filter::new()
            .time_range(TimeRange::new(201.0, 300.0))
            .matches(&record));
        assert!(!Filter::new()
            .schema(Schema::Timeseries { dimension: None })
            .matches(&record));
        assert!(!Filter::new()
            .pattern(tc("color=red"))
            .ids([EventId(6)])
            .matches(&record));
    }

    #[test]
    fn test_record_serialization_with_infinite_bounds() {
        let record = Record::from(series(&[1.0]));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"kind\":\"timeseries\""));
        assert!(json.contains("\"start\":null"));
        assert!(json.contains("\"tagset\":\"kind=temp\""));

        let restored: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
    }
}
