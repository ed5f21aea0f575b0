//! Presentation time coordinates
//!
//! A cache can present every record on a different time axis than the one
//! the store uses (for example seconds since the start of an experiment
//! run). Records are converted on the way in; write-through calls convert
//! back to the native axis before reaching the store.

use chrono::{DateTime, Utc};

use crate::cache::error::{CacheError, CacheResult};
use crate::storage::{Record, Sample};
use crate::tagset::{Tag, Tagset};

/// Bidirectional mapping between native and presentation time
pub trait TimeCoordinate: Send + Sync {
    fn to_presentation(&self, t: f64) -> f64;

    fn to_native(&self, t: f64) -> f64;

    /// Adjust a native tagset for presentation
    fn present_tags(&self, tagset: Tagset) -> Tagset {
        tagset
    }

    /// Undo `present_tags`
    fn native_tags(&self, tagset: Tagset) -> Tagset {
        tagset
    }
}

/// Linear rebasing: `t' = (t - offset) / scale`
///
/// Presented tagsets carry `timebase=<label>` so that records from
/// differently rebased caches are not confused.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineCoordinate {
    label: String,
    offset: f64,
    scale: f64,
}

impl AffineCoordinate {
    /// Name of the tag added to presented tagsets
    pub const TAG_NAME: &'static str = "timebase";

    pub fn new(label: impl Into<String>, offset: f64, scale: f64) -> CacheResult<Self> {
        if !offset.is_finite() {
            return Err(CacheError::InvalidCoordinate(format!(
                "offset must be finite, got {}",
                offset
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CacheError::InvalidCoordinate(format!(
                "scale must be positive and finite, got {}",
                scale
            )));
        }
        Ok(Self {
            label: label.into(),
            offset,
            scale,
        })
    }

    /// Seconds elapsed since `origin`
    pub fn since(label: impl Into<String>, origin: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            offset: origin.timestamp_millis() as f64 / 1000.0,
            scale: 1.0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn tag(&self) -> Tag {
        Tag::new(Self::TAG_NAME, self.label.clone())
    }
}

impl TimeCoordinate for AffineCoordinate {
    fn to_presentation(&self, t: f64) -> f64 {
        (t - self.offset) / self.scale
    }

    fn to_native(&self, t: f64) -> f64 {
        t * self.scale + self.offset
    }

    fn present_tags(&self, mut tagset: Tagset) -> Tagset {
        tagset.insert(self.tag());
        tagset
    }

    fn native_tags(&self, mut tagset: Tagset) -> Tagset {
        tagset.remove(&self.tag());
        tagset
    }
}

/// Convert a native record to presentation form
pub fn present_record(coordinate: &dyn TimeCoordinate, mut record: Record) -> Record {
    let event = record.event_mut();
    event.start = coordinate.to_presentation(event.start);
    event.end = coordinate.to_presentation(event.end);
    event.tagset = coordinate.present_tags(std::mem::take(&mut event.tagset));

    if let Some(ts) = record.as_timeseries_mut() {
        for sample in &mut ts.samples {
            sample.time = coordinate.to_presentation(sample.time);
        }
    }
    record
}

pub fn present_sample(coordinate: &dyn TimeCoordinate, sample: Sample) -> Sample {
    Sample {
        time: coordinate.to_presentation(sample.time),
        value: sample.value,
    }
}

pub fn native_sample(coordinate: &dyn TimeCoordinate, sample: Sample) -> Sample {
    Sample {
        time: coordinate.to_native(sample.time),
        value: sample.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Event, EventId, Timeseries};
    use chrono::TimeZone;

    #[test]
    fn test_affine_round_trip() {
        let coord = AffineCoordinate::new("run", 100.0, 2.0).unwrap();
        assert_eq!(coord.to_presentation(110.0), 5.0);
        assert_eq!(coord.to_native(5.0), 110.0);
        assert_eq!(coord.to_presentation(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            AffineCoordinate::new("x", 0.0, 0.0),
            Err(CacheError::InvalidCoordinate(_))
        ));
        assert!(AffineCoordinate::new("x", f64::NAN, 1.0).is_err());
        assert!(AffineCoordinate::new("x", 0.0, -1.0).is_err());
    }

    #[test]
    fn test_since_origin() {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let coord = AffineCoordinate::since("run", origin);
        let native = origin.timestamp() as f64 + 90.0;
        assert_eq!(coord.to_presentation(native), 90.0);
    }

    #[test]
    fn test_tags_round_trip() {
        let coord = AffineCoordinate::new("run", 0.0, 1.0).unwrap();
        let native = Tagset::parse("color=red").unwrap();
        let presented = coord.present_tags(native.clone());
        assert_eq!(presented.get("timebase"), Some("run"));
        assert_eq!(coord.native_tags(presented), native);
    }

    #[test]
    fn test_present_record() {
        let coord = AffineCoordinate::new("run", 10.0, 1.0).unwrap();
        let event = Event::new(EventId(1), 10.0, 20.0, Tagset::parse("a=1").unwrap());
        let ts = Timeseries::new(event, 1).with_samples(vec![Sample::scalar(15.0, 1.0)]);

        let presented = present_record(&coord, Record::from(ts));
        assert_eq!(presented.event().start, 0.0);
        assert_eq!(presented.event().end, 10.0);
        assert_eq!(presented.as_timeseries().unwrap().samples[0].time, 5.0);
        assert_eq!(presented.tagset().to_string(), "a=1,timebase=run");
    }
}
