use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::care;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "plants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub strain: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_url: Option<String>,
    pub health_percentage: i32,
    pub next_watering_days: i32,
    pub next_nutrient_days: i32,
    pub is_deleted: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reminder::Entity")]
    Reminder,
}

impl Related<super::reminder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reminder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for care::Plant {
    fn from(model: Model) -> Self {
        care::Plant {
            id: model.id,
            name: model.name,
            strain: model.strain,
            image_url: model.image_url,
            health_percentage: model.health_percentage.clamp(0, 100),
            next_watering_days: model.next_watering_days,
            next_nutrient_days: model.next_nutrient_days,
        }
    }
}
