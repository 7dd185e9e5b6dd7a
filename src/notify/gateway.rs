//! Notification gateway trait and in-process implementations
//!
//! Delivery is best-effort: the core never waits on a gateway before
//! committing, and a failed delivery never rolls anything back.

use crate::error::Result;
use crate::types::ClubId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

/// Kinds of match events pushed to clubs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "match.found")]
    MatchFound,
    #[serde(rename = "result.proposed")]
    ResultProposed,
    #[serde(rename = "result.confirmed")]
    ResultConfirmed,
    #[serde(rename = "result.rejected")]
    ResultRejected,
    #[serde(rename = "schedule.updated")]
    ScheduleUpdated,
}

impl NotificationKind {
    /// Stable event name, also used as the AMQP routing key
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MatchFound => "match.found",
            NotificationKind::ResultProposed => "result.proposed",
            NotificationKind::ResultConfirmed => "result.confirmed",
            NotificationKind::ResultRejected => "result.rejected",
            NotificationKind::ScheduleUpdated => "schedule.updated",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification addressed to a club
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub club_id: ClubId,
    pub kind: NotificationKind,
    pub payload: HashMap<String, String>,
}

/// Push/real-time delivery channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(
        &self,
        club_id: ClubId,
        kind: NotificationKind,
        payload: HashMap<String, String>,
    ) -> Result<()>;
}

/// Gateway that only writes notifications to the log
#[derive(Debug, Default)]
pub struct TracingNotificationGateway;

#[async_trait]
impl NotificationGateway for TracingNotificationGateway {
    async fn notify(
        &self,
        club_id: ClubId,
        kind: NotificationKind,
        payload: HashMap<String, String>,
    ) -> Result<()> {
        info!("Notify club {}: {} {:?}", club_id, kind, payload);
        Ok(())
    }
}

/// A delivered notification with its arrival time
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub notification: Notification,
    pub received_at: DateTime<Utc>,
}

/// Gateway that keeps every delivered message in memory
#[derive(Debug, Default)]
pub struct RecordingNotificationGateway {
    messages: Mutex<Vec<RecordedMessage>>,
}

impl RecordingNotificationGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full message log in arrival order
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Notifications delivered to one club
    pub fn messages_for(&self, club_id: ClubId) -> Vec<Notification> {
        self.messages()
            .into_iter()
            .map(|message| message.notification)
            .filter(|notification| notification.club_id == club_id)
            .collect()
    }

    /// Count of delivered notifications of one kind
    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.messages()
            .iter()
            .filter(|message| message.notification.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotificationGateway {
    async fn notify(
        &self,
        club_id: ClubId,
        kind: NotificationKind,
        payload: HashMap<String, String>,
    ) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(RecordedMessage {
                notification: Notification {
                    club_id,
                    kind,
                    payload,
                },
                received_at: crate::utils::current_timestamp(),
            });
        }
        Ok(())
    }
}
