//! Notification hub
//!
//! Tracks filter-scoped subscriptions and fans notifications out to them.
//! Each subscriber owns an unbounded channel, so a slow consumer never
//! blocks the store; a subscriber whose receiver was dropped is pruned on
//! the next publish.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::Notification;
use crate::storage::{Filter, Record};

/// Unique identifier for a subscription
pub type SubscriptionId = String;

/// Fans store notifications out to subscribers
pub struct NotificationHub {
    /// Active subscriptions: SubscriptionId → SubscriberHandle
    subscribers: Arc<RwLock<HashMap<SubscriptionId, SubscriberHandle>>>,
    config: HubConfig,
}

/// Configuration for the notification hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent subscriptions
    pub max_subscriptions: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: 1024,
        }
    }
}

/// Sending side of one subscription
struct SubscriberHandle {
    sender: mpsc::UnboundedSender<Notification>,
    /// Records in scope for this subscriber
    filter: Filter,
}

impl SubscriberHandle {
    fn in_scope(&self, before: Option<&Record>, after: Option<&Record>) -> bool {
        before.map_or(false, |r| self.filter.matches(r))
            || after.map_or(false, |r| self.filter.matches(r))
    }
}

impl NotificationHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Register a subscription
    ///
    /// Returns the subscription id and the receiving end of its channel, or
    /// an error if the subscription limit has been reached.
    pub async fn register(
        &self,
        filter: Filter,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<Notification>), HubError> {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.len() >= self.config.max_subscriptions {
            return Err(HubError::TooManySubscriptions(self.config.max_subscriptions));
        }

        let id = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();

        tracing::info!(subscription_id = %id, filter = %filter, "Subscription registered");
        subscribers.insert(id.clone(), SubscriberHandle { sender, filter });
        Ok((id, receiver))
    }

    /// Remove a subscription
    pub async fn unregister(&self, id: &str) -> Result<(), HubError> {
        self.subscribers
            .write()
            .await
            .remove(id)
            .ok_or_else(|| HubError::SubscriptionNotFound(id.to_string()))?;

        tracing::info!(subscription_id = %id, "Subscription removed");
        Ok(())
    }

    /// Deliver a notification to every subscriber whose filter matches the
    /// record before or after the change
    ///
    /// Returns the number of subscribers reached.
    pub async fn publish(
        &self,
        notification: &Notification,
        before: Option<&Record>,
        after: Option<&Record>,
    ) -> usize {
        let mut closed = Vec::new();
        let mut sent_count = 0;
        {
            let subscribers = self.subscribers.read().await;
            for (id, handle) in subscribers.iter() {
                if !handle.in_scope(before, after) {
                    continue;
                }
                if handle.sender.send(notification.clone()).is_ok() {
                    sent_count += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &closed {
                subscribers.remove(id);
                tracing::debug!(subscription_id = %id, "Pruned closed subscription");
            }
        }

        sent_count
    }

    /// Get the current subscription count
    pub async fn subscription_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

/// Errors that can occur in the notification hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many subscriptions (limit: {0})")]
    TooManySubscriptions(usize),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),
}
