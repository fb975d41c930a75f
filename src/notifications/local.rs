use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::{NotificationContent, NotificationScheduler};
use crate::error::NotificationError;

/// A notification whose trigger time has passed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveredNotification {
    pub id: Uuid,
    pub content: NotificationContent,
    pub trigger: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
}

/// In-process notifier. Each schedule is a sleeping tokio task that
/// publishes on a broadcast channel when it fires; there is no device push
/// behind it, deliveries are only logged and fanned out to subscribers.
pub struct LocalNotifier {
    pending: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    deliveries: broadcast::Sender<DeliveredNotification>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        let (deliveries, _) = broadcast::channel(64);
        Self {
            pending: Mutex::new(HashMap::new()),
            deliveries,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveredNotification> {
        self.deliveries.subscribe()
    }

    /// Ids with a schedule that has not fired or been cancelled yet.
    pub async fn pending(&self) -> Vec<Uuid> {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, handle| !handle.is_finished());
        let mut ids: Vec<Uuid> = pending.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for LocalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalNotifier {
    fn drop(&mut self) {
        for (_, handle) in self.pending.get_mut().drain() {
            handle.abort();
        }
    }
}

#[async_trait]
impl NotificationScheduler for LocalNotifier {
    async fn schedule(
        &self,
        id: Uuid,
        content: NotificationContent,
        trigger: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        if content.title.trim().is_empty() {
            return Err(NotificationError::MissingContent("title".into()));
        }
        let now = Utc::now();
        if trigger <= now {
            warn!(notification_id = %id, %trigger, "Refusing to schedule notification in the past");
            return Err(NotificationError::Rejected(format!(
                "trigger {} is not in the future",
                trigger
            )));
        }

        let wait = (trigger - now).to_std().unwrap_or_default();
        let deliveries = self.deliveries.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            info!("🔔 [MOCK PUSH] {} :: {}", content.title, content.body);
            crate::metrics::increment_notifications_delivered();
            // No subscribers is fine.
            let _ = deliveries.send(DeliveredNotification {
                id,
                content,
                trigger,
                delivered_at: Utc::now(),
            });
        });

        if let Some(previous) = self.pending.lock().await.insert(id, handle) {
            previous.abort();
            info!(notification_id = %id, "Replaced existing notification schedule");
        }
        info!(notification_id = %id, %trigger, "📅 Notification scheduled");
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> Result<(), NotificationError> {
        if let Some(handle) = self.pending.lock().await.remove(&id) {
            handle.abort();
            info!(notification_id = %id, "🔕 Notification cancelled");
        }
        Ok(())
    }
}
