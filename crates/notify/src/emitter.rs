//! Timeout-bounded, never-failing notification emitter.

use std::time::Duration;

use crate::channel::NotificationChannel;
use crate::event::Notification;

/// Emitter configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `NOTIFY_TIMEOUT_MS` — publish timeout in milliseconds (default: `2000`)
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub timeout: Duration,
}

impl EmitterConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let timeout_ms = std::env::var("NOTIFY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_000);
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
        }
    }
}

/// Publishes domain notifications without ever failing the caller.
///
/// Every publish is bounded by the configured timeout. Timeouts and channel
/// errors are logged and surfaced as a dropped-notification metric; they are
/// never returned as errors because no correctness property depends on
/// notification delivery.
#[derive(Debug, Clone)]
pub struct NotificationEmitter<C> {
    channel: C,
    timeout: Duration,
}

impl<C: NotificationChannel> NotificationEmitter<C> {
    /// Creates an emitter over the given channel.
    pub fn new(channel: C, config: EmitterConfig) -> Self {
        Self {
            channel,
            timeout: config.timeout,
        }
    }

    /// Attempts delivery of a notification, bounded by the emitter timeout.
    pub async fn publish(&self, notification: Notification) {
        let event_type = notification.event_type();

        match tokio::time::timeout(self.timeout, self.channel.publish(&notification)).await {
            Ok(Ok(())) => {
                metrics::counter!("notifications_published_total").increment(1);
                tracing::debug!(event_type, "notification published");
            }
            Ok(Err(e)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(event_type, error = %e, "notification dropped");
            }
            Err(_) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(
                    event_type,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "notification publish timed out"
                );
            }
        }
    }
}
