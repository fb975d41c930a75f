use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::care;
use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "reminders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub plant_id: Uuid,
    pub reminder_type: String,
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub scheduled_for: DateTimeUtc,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plant::Entity",
        from = "Column::PlantId",
        to = "super::plant::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Plant,
}

impl Related<super::plant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for care::Reminder {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let reminder_type = model
            .reminder_type
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("reminder {}: {}", model.id, e)))?;
        Ok(care::Reminder {
            id: model.id,
            plant_id: model.plant_id,
            reminder_type,
            title: model.title,
            description: model.description,
            scheduled_for: model.scheduled_for,
            is_completed: model.is_completed,
            is_deleted: model.is_deleted,
            created_at: model.created_at,
        })
    }
}

impl ActiveModel {
    /// Fresh row for a new reminder.
    pub fn from_reminder(reminder: &care::Reminder, now: DateTimeUtc) -> Self {
        ActiveModel {
            id: Set(reminder.id),
            plant_id: Set(reminder.plant_id),
            reminder_type: Set(reminder.reminder_type.as_str().to_string()),
            title: Set(reminder.title.clone()),
            description: Set(reminder.description.clone()),
            scheduled_for: Set(reminder.scheduled_for),
            is_completed: Set(reminder.is_completed),
            is_deleted: Set(reminder.is_deleted),
            completed_at: Set(reminder.is_completed.then_some(now)),
            created_at: Set(reminder.created_at),
            updated_at: Set(now),
        }
    }

    /// Copies the mutable fields of `reminder` onto an existing row.
    pub fn apply(&mut self, reminder: &care::Reminder, was_completed: bool, now: DateTimeUtc) {
        self.scheduled_for = Set(reminder.scheduled_for);
        self.is_completed = Set(reminder.is_completed);
        self.is_deleted = Set(reminder.is_deleted);
        if reminder.is_completed && !was_completed {
            self.completed_at = Set(Some(now));
        }
        self.updated_at = Set(now);
    }
}
