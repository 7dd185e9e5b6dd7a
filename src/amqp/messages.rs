//! AMQP message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::notify::{Notification, NotificationKind};
use crate::types::ClubId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default topic exchange for match notifications
pub const NOTIFICATIONS_EXCHANGE: &str = "matchday.notifications";

/// Body of a notification as published on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubNotification {
    pub club_id: ClubId,
    pub kind: NotificationKind,
    pub payload: HashMap<String, String>,
}

impl From<Notification> for ClubNotification {
    fn from(notification: Notification) -> Self {
        Self {
            club_id: notification.club_id,
            kind: notification.kind,
            payload: notification.payload,
        }
    }
}

/// Message envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: impl Into<String>) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key: routing_key.into(),
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MatchmakingError::InternalError {
            message: format!("Failed to serialize message: {}", e),
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| MatchmakingError::InvalidArgument {
            reason: format!("Failed to deserialize message: {}", e),
        })
    }
}
