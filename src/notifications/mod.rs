pub mod local;
pub mod templates;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotificationError;

pub use local::{DeliveredNotification, LocalNotifier};
pub use templates::NotificationTemplates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Device notification scheduler. Both calls may fail; callers treat
/// failures as non-fatal.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Schedules (or replaces) the notification keyed by `id`.
    async fn schedule(
        &self,
        id: Uuid,
        content: NotificationContent,
        trigger: DateTime<Utc>,
    ) -> Result<(), NotificationError>;

    /// Cancels the notification keyed by `id`. Unknown ids are not an error.
    async fn cancel(&self, id: Uuid) -> Result<(), NotificationError>;
}
