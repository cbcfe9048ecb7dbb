//! Best-effort domain notification publishing.
//!
//! Notifications are a pure side channel: delivery is bounded by a short
//! timeout and failures are logged and counted, never propagated to the
//! caller. No core invariant depends on a notification arriving.

pub mod channel;
pub mod emitter;
pub mod event;

pub use channel::{ChannelError, FailingChannel, InMemoryChannel, NotificationChannel, SlowChannel};
pub use emitter::{EmitterConfig, NotificationEmitter};
pub use event::Notification;
