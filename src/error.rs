use uuid::Uuid;

use crate::care::{ReminderState, ValidationError};

/// The persistence mutation itself failed. The only failure class surfaced to
/// the user as an operation failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage task aborted: {0}")]
    Aborted(String),
}

/// A notification schedule/cancel was rejected. Logged, never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification rejected: {0}")]
    Rejected(String),

    #[error("Notification content unavailable: {0}")]
    MissingContent(String),
}

/// Per-item failure of a reminder command.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Reminder {0} not found")]
    NotFound(Uuid),

    #[error("Plant {0} not found")]
    PlantNotFound(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Reminder {id} is {state}")]
    Terminal { id: Uuid, state: ReminderState },

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ActionError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { id, .. } => ActionError::NotFound(id),
            other => ActionError::Storage(other),
        }
    }
}

impl ActionError {
    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::NotFound(_) | ActionError::PlantNotFound(_) => "NOT_FOUND",
            ActionError::Validation(e) => e.code(),
            ActionError::Terminal { .. } => "INVALID_TRANSITION",
            ActionError::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}
