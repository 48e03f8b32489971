//! Notification delivery collaborator contract.

use async_trait::async_trait;
use thiserror::Error;

use super::NotificationIntent;

/// Error from the external notification transport.
///
/// Delivery is best-effort: this error is logged at the boundary of the
/// core and never propagated as a failure of the mutating operation that
/// produced the intent.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Notification transport failure: {0}")]
    Transport(String),
}

/// Trait for notification delivery backends (email, push, etc.).
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver a single notification.
    async fn send(&self, intent: &NotificationIntent) -> Result<(), DeliveryError>;
}

/// Deliver a batch of intents, logging failures without propagating them.
///
/// Convenience for callers that do not run the background dispatcher.
pub async fn deliver_all(sender: &dyn NotificationSender, intents: &[NotificationIntent]) {
    for intent in intents {
        match sender.send(intent).await {
            Ok(()) => {
                crate::metrics::NOTIFICATIONS_DELIVERED
                    .with_label_values(&[intent.kind.as_str(), "success"])
                    .inc();
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
}
