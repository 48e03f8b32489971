use tokio::sync::mpsc;

use super::NotificationIntent;

/// Handle for queueing notification intents.
///
/// Cheaply cloneable; share it across tasks. Intents are sent through an
/// async channel to be delivered by the [`NotificationDispatcher`].
///
/// [`NotificationDispatcher`]: super::NotificationDispatcher
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<NotificationIntent>,
}

impl NotifyHandle {
    /// Create a new handle from a channel sender.
    pub fn new(tx: mpsc::Sender<NotificationIntent>) -> Self {
        Self { tx }
    }

    /// Queue an intent for delivery.
    ///
    /// If the channel is full or closed the error is logged but the caller
    /// is not blocked or failed; the state change producing the intent has
    /// already committed.
    pub async fn emit(&self, intent: NotificationIntent) {
        if let Err(e) = self.tx.send(intent).await {
            tracing::error!("Failed to queue notification intent: {}", e);
        }
    }

    /// Queue a batch of intents, typically the output of one mutating
    /// operation.
    pub async fn emit_all(&self, intents: Vec<NotificationIntent>) {
        for intent in intents {
            self.emit(intent).await;
        }
    }

    /// Queue an intent from a non-async context (blocking).
    pub fn emit_blocking(&self, intent: NotificationIntent) {
        if let Err(e) = self.tx.blocking_send(intent) {
            tracing::error!("Failed to queue notification intent: {}", e);
        }
    }

    /// Try to queue an intent without blocking.
    ///
    /// Returns true if the intent was queued.
    pub fn try_emit(&self, intent: NotificationIntent) -> bool {
        match self.tx.try_send(intent) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to queue notification intent: {}", e);
                false
            }
        }
    }
}
