//! Notification channel trait and test implementations.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::Notification;

/// Errors that can occur while publishing to the external channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel rejected or could not accept the notification.
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Transport for delivering notifications to the external message channel.
///
/// Implementations are expected to be at-least-once and asynchronous; the
/// emitter wraps every call in a timeout, so an implementation may block
/// indefinitely without affecting callers.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers a single notification.
    async fn publish(&self, notification: &Notification) -> Result<(), ChannelError>;
}

/// In-memory channel for testing; records every published notification.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChannel {
    published: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryChannel {
    /// Creates a new empty in-memory channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all published notifications in order.
    pub fn published(&self) -> Vec<Notification> {
        self.published.read().unwrap().clone()
    }

    /// Returns the number of published notifications.
    pub fn published_count(&self) -> usize {
        self.published.read().unwrap().len()
    }

    /// Returns the number of published notifications of the given type.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.published
            .read()
            .unwrap()
            .iter()
            .filter(|n| n.event_type() == event_type)
            .count()
    }
}

#[async_trait]
impl NotificationChannel for InMemoryChannel {
    async fn publish(&self, notification: &Notification) -> Result<(), ChannelError> {
        self.published.write().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Channel that always fails, for testing the best-effort contract.
#[derive(Debug, Clone, Default)]
pub struct FailingChannel;

#[async_trait]
impl NotificationChannel for FailingChannel {
    async fn publish(&self, _notification: &Notification) -> Result<(), ChannelError> {
        Err(ChannelError::Unavailable("broker down".to_string()))
    }
}

/// Channel that sleeps before accepting, for testing the timeout bound.
#[derive(Debug, Clone)]
pub struct SlowChannel {
    delay: Duration,
    inner: InMemoryChannel,
}

impl SlowChannel {
    /// Creates a channel that delays every publish by `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: InMemoryChannel::new(),
        }
    }

    /// Returns the number of notifications that made it through the delay.
    pub fn published_count(&self) -> usize {
        self.inner.published_count()
    }
}

#[async_trait]
impl NotificationChannel for SlowChannel {
    async fn publish(&self, notification: &Notification) -> Result<(), ChannelError> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish(notification).await
    }
}
