//! AMQP transport for match notifications
//!
//! This module handles the broker connection and publishing of notification
//! envelopes when the service is configured to use AMQP.

pub mod connection;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::AmqpConnection;
pub use messages::{ClubNotification, MessageEnvelope, NOTIFICATIONS_EXCHANGE};
pub use publisher::{AmqpNotificationGateway, PublisherConfig};
