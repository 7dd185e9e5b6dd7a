//! Fire-and-forget notification dispatch
//!
//! Each notification is delivered on its own tokio task after the store
//! commit. Failures are logged and counted; they never reach the caller.

use crate::metrics::MetricsCollector;
use crate::notify::gateway::{Notification, NotificationGateway, NotificationKind};
use crate::types::ClubId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub struct NotificationDispatcher {
    gateway: Arc<dyn NotificationGateway>,
    metrics: Option<Arc<MetricsCollector>>,
    tasks: Mutex<JoinSet<()>>,
}

impl NotificationDispatcher {
    pub fn new(gateway: Arc<dyn NotificationGateway>, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            gateway,
            metrics,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue one notification for background delivery
    pub fn dispatch(&self, club_id: ClubId, kind: NotificationKind, payload: HashMap<String, String>) {
        let gateway = self.gateway.clone();
        let metrics = self.metrics.clone();

        let Ok(mut tasks) = self.tasks.lock() else {
            warn!("Dropping {} for club {}: dispatcher lock poisoned", kind, club_id);
            return;
        };

        // Reap finished deliveries so the set does not grow unbounded
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let started = Instant::now();
            let result = gateway.notify(club_id, kind, payload).await;
            let success = result.is_ok();

            match result {
                Ok(()) => debug!("Delivered {} to club {}", kind, club_id),
                Err(e) => warn!("Failed to deliver {} to club {}: {}", kind, club_id, e),
            }

            if let Some(metrics) = metrics {
                metrics.record_notification(kind, success, started.elapsed());
            }
        });
    }

    pub fn dispatch_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.dispatch(notification.club_id, notification.kind, notification.payload);
        }
    }

    /// Deliveries spawned and not yet reaped
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Wait for every in-flight delivery to finish
    pub async fn drain(&self) {
        loop {
            let mut pending = match self.tasks.lock() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }

            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    warn!("Notification task ended abnormally: {}", e);
                }
            }
        }
    }
}
