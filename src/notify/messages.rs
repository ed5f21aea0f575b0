//! Notification message types
//!
//! Defines the change notifications a store pushes to its subscribers.

use serde::{Deserialize, Serialize};

use crate::storage::{EventId, Record, Sample};
use crate::tagset::Tagset;

/// A change to one record, pushed to subscribers in store order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A record was created
    Added { record: Record },
    /// A record was deleted
    Removed { id: EventId },
    /// Samples were appended to a timeseries
    DataAdded { id: EventId, samples: Vec<Sample> },
    /// A record's tagset was replaced
    TagsChanged { id: EventId, tagset: Tagset },
    /// A record's start and/or end changed
    TimeChanged {
        id: EventId,
        #[serde(with = "crate::storage::lower_bound")]
        start: f64,
        #[serde(with = "crate::storage::upper_bound")]
        end: f64,
    },
}

impl Notification {
    /// Id of the record this notification concerns
    pub fn id(&self) -> EventId {
        match self {
            Notification::Added { record } => record.id(),
            Notification::Removed { id }
            | Notification::DataAdded { id, .. }
            | Notification::TagsChanged { id, .. }
            | Notification::TimeChanged { id, .. } => *id,
        }
    }

    /// JSON form, as written to notification logs
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Short name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Added { .. } => "added",
            Notification::Removed { .. } => "removed",
            Notification::DataAdded { .. } => "data_added",
            Notification::TagsChanged { .. } => "tags_changed",
            Notification::TimeChanged { .. } => "time_changed",
        }
    }
}
