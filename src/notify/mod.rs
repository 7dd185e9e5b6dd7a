//! Match event notifications
//!
//! The gateway trait is the push/real-time collaborator; the dispatcher runs
//! deliveries in the background after the store has committed.

pub mod dispatcher;
pub mod gateway;

pub use dispatcher::NotificationDispatcher;
pub use gateway::{
    Notification, NotificationGateway, NotificationKind, RecordedMessage,
    RecordingNotificationGateway, TracingNotificationGateway,
};
