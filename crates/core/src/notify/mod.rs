//! Notification intents, delivery contract, and background dispatcher.

mod dispatcher;
mod handle;
mod intent;
mod sender;

pub use dispatcher::{create_notification_system, NotificationDispatcher};
pub use handle::NotifyHandle;
pub use intent::{NotificationIntent, NotificationKind};
pub use sender::{deliver_all, DeliveryError, NotificationSender};
