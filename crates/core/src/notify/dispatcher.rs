use std::sync::Arc;

use tokio::sync::mpsc;

use super::{NotificationIntent, NotificationSender, NotifyHandle};

/// Background task that receives notification intents and hands them to
/// the external sender.
///
/// A delivery failure is logged and the dispatcher moves on; it never
/// tears down or back-propagates into the operation that produced the
/// intent.
pub struct NotificationDispatcher {
    rx: mpsc::Receiver<NotificationIntent>,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationDispatcher {
    pub fn new(rx: mpsc::Receiver<NotificationIntent>, sender: Arc<dyn NotificationSender>) -> Self {
        Self { rx, sender }
    }

    /// Run the dispatcher, consuming intents until the channel is closed.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Notification dispatcher started");

        while let Some(intent) = self.rx.recv().await {
            match self.sender.send(&intent).await {
                Ok(()) => {
                    crate::metrics::NOTIFICATIONS_DELIVERED
                        .with_label_values(&[intent.kind.as_str(), "success"])
                        .inc();
                    tracing::debug!(
                        kind = intent.kind.as_str(),
                        user_id = %intent.user_id,
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    crate::metrics::NOTIFICATIONS_DELIVERED
                        .with_label_values(&[intent.kind.as_str(), "error"])
                        .inc();
                    tracing::warn!(
                        kind = intent.kind.as_str(),
                        user_id = %intent.user_id,
                        "Notification delivery failed: {}",
                        e
                    );
                }
            }
        }

        tracing::info!("Notification dispatcher shutting down");
    }
}

/// Create a complete notification system.
///
/// Returns:
/// - `NotifyHandle` - for queueing intents (clone this to share across tasks)
/// - `NotificationDispatcher` - spawn this with `tokio::spawn(dispatcher.run())`
///
/// # Arguments
/// * `sender` - The delivery backend
/// * `buffer_size` - Size of the channel buffer
pub fn create_notification_system(
    sender: Arc<dyn NotificationSender>,
    buffer_size: usize,
) -> (NotifyHandle, NotificationDispatcher) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = NotifyHandle::new(tx);
    let dispatcher = NotificationDispatcher::new(rx, sender);
    (handle, dispatcher)
}
