//! Notification dispatch: payload mapping, icon resolution, batch driving.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::IconCache;
use crate::error::NotifyError;
use crate::types::{Message, batch_high_water};

/// Renderable notification, derived per message and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Display title: message title, else app name, else fixed fallback.
    pub title: String,
    /// Body text, omitted entirely when the message has none.
    pub body: Option<String>,
    /// Resolved icon file, absent when no icon could be provided.
    pub icon_path: Option<PathBuf>,
}

impl NotificationPayload {
    /// Map a message to its payload with an already-resolved icon.
    #[must_use]
    pub fn from_message(message: &Message, icon_path: Option<PathBuf>) -> Self {
        Self {
            title: message.notification_title().to_string(),
            body: message.message.clone(),
            icon_path,
        }
    }
}

/// Local notification sink. Fire-and-forget: delivery failures are
/// logged by the dispatcher and never retried.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    /// Returns `NotifyError` when the local subsystem rejects it.
    fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Sink backed by the OS notification subsystem.
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let mut notification = notify_rust::Notification::new();
        notification.summary(&payload.title);
        if let Some(body) = &payload.body {
            notification.body(body);
        }
        if let Some(icon) = &payload.icon_path {
            notification.icon(&icon.to_string_lossy());
        }
        notification
            .show()
            .map(|_| ())
            .map_err(|err| NotifyError::Sink(err.to_string()))
    }
}

/// Drives a fetched batch through icon resolution and the sink.
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    cache: Option<Arc<dyn IconCache>>,
}

impl Dispatcher {
    /// Build a dispatcher. `cache: None` disables icon resolution
    /// entirely; every notification then goes out iconless.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, cache: Option<Arc<dyn IconCache>>) -> Self {
        Self { sink, cache }
    }

    /// Dispatch every message in the order received and return the
    /// batch high-water mark for acknowledgment.
    ///
    /// Per-message failures are logged and never abort the batch: the
    /// server only tracks a high-water mark, so a lost local
    /// notification must not block cursor advancement.
    pub async fn dispatch_batch(&self, messages: &[Message]) -> Option<u64> {
        for message in messages {
            let icon_path = match &self.cache {
                Some(cache) => cache.resolve(&message.icon_key()).await,
                None => None,
            };

            let payload = NotificationPayload::from_message(message, icon_path);
            info!(message_id = message.id, "Sending notification");
            if let Err(err) = self.sink.notify(&payload) {
                warn!(message_id = message.id, error = %err, "Failed to deliver notification");
            }
        }

        batch_high_water(messages)
    }
}
