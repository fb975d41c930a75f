//! PostgreSQL-backed store on top of the sea-orm entities.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Mutation, PlantStore, ReminderMutator, ReminderQuery, ReminderStore};
use crate::care::{Plant, Reminder};
use crate::entities::{plant, reminder};
use crate::error::StoreError;

pub struct SeaOrmStore {
    db: DatabaseConnection,
    reminder_revision: watch::Sender<u64>,
    plant_revision: watch::Sender<u64>,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        let (reminder_revision, _) = watch::channel(0);
        let (plant_revision, _) = watch::channel(0);
        Self {
            db,
            reminder_revision,
            plant_revision,
        }
    }

    /// Other writers share the database, so live queries also refresh on a
    /// fixed interval. Unchanged results are not re-emitted downstream.
    pub fn spawn_poller(
        self: &std::sync::Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Store poller started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Store poller stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.reminder_revision.send_modify(|rev| *rev += 1);
                        store.plant_revision.send_modify(|rev| *rev += 1);
                    }
                }
            }
        })
    }
}

fn decode_all(models: Vec<reminder::Model>) -> Vec<Reminder> {
    models
        .into_iter()
        .filter_map(|model| match Reminder::try_from(model) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable reminder row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ReminderStore for SeaOrmStore {
    async fn list(&self, query: &ReminderQuery) -> Result<Vec<Reminder>, StoreError> {
        let mut select = reminder::Entity::find()
            .filter(reminder::Column::IsDeleted.eq(false))
            .filter(reminder::Column::IsCompleted.eq(query.completed));
        if let Some(plant_id) = query.plant_id {
            select = select.filter(reminder::Column::PlantId.eq(plant_id));
        }
        let models = select
            .order_by_asc(reminder::Column::ScheduledFor)
            .order_by_asc(reminder::Column::Id)
            .all(&self.db)
            .await?;
        Ok(decode_all(models))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Reminder>, StoreError> {
        match reminder::Entity::find_by_id(id).one(&self.db).await? {
            Some(model) => Ok(Some(Reminder::try_from(model)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, reminder: Reminder) -> Result<Reminder, StoreError> {
        let model = reminder::ActiveModel::from_reminder(&reminder, Utc::now())
            .insert(&self.db)
            .await?;
        self.reminder_revision.send_modify(|rev| *rev += 1);
        Reminder::try_from(model)
    }

    async fn update(&self, id: Uuid, mutator: ReminderMutator) -> Result<Mutation, StoreError> {
        // Dropping `txn` on any early return rolls back.
        let txn = self.db.begin().await?;

        let model = reminder::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "reminder",
                id,
            })?;

        let mut current = Reminder::try_from(model.clone())?;
        let was_completed = current.is_completed;
        let changed = mutator(&mut current);

        if changed {
            let mut active: reminder::ActiveModel = model.into();
            active.apply(&current, was_completed, Utc::now());
            active.update(&txn).await?;
        }
        txn.commit().await?;

        if changed {
            self.reminder_revision.send_modify(|rev| *rev += 1);
        }
        Ok(Mutation {
            reminder: current,
            changed,
        })
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.reminder_revision.subscribe()
    }
}

#[async_trait]
impl PlantStore for SeaOrmStore {
    async fn list_plants(&self) -> Result<Vec<Plant>, StoreError> {
        let models = plant::Entity::find()
            .filter(plant::Column::IsDeleted.eq(false))
            .order_by_asc(plant::Column::Name)
            .order_by_asc(plant::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Plant::from).collect())
    }

    async fn find_plant(&self, id: Uuid) -> Result<Option<Plant>, StoreError> {
        let model = plant::Entity::find_by_id(id)
            .filter(plant::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?;
        Ok(model.map(Plant::from))
    }

    fn plant_changes(&self) -> watch::Receiver<u64> {
        self.plant_revision.subscribe()
    }
}
