//! Change notifications
//!
//! A store pushes one `Notification` per applied mutation to every
//! subscriber whose filter covers the affected record.
//!
//! ## Architecture
//!
//! - **NotificationHub**: Manages subscriptions and fans notifications out
//! - **Notification**: The five change kinds (added, removed, data added,
//!   tags changed, time changed)
//!
//! A record that leaves a subscriber's scope still produces one final
//! notification, so a subscriber can tell when to forget it.

mod hub;
mod messages;

pub use hub::{HubConfig, HubError, NotificationHub, SubscriptionId};
pub use messages::Notification;
