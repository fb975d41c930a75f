use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::{Mutation, PlantStore, ReminderMutator, ReminderQuery, ReminderStore};
use crate::care::{Plant, Reminder};
use crate::error::StoreError;

/// In-process store used for local development and tests.
///
/// A single mutex per collection serializes writes, which is all the
/// collaborator contract asks for.
pub struct MemoryStore {
    reminders: Mutex<HashMap<Uuid, Reminder>>,
    plants: Mutex<HashMap<Uuid, Plant>>,
    reminder_revision: watch::Sender<u64>,
    plant_revision: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (reminder_revision, _) = watch::channel(0);
        let (plant_revision, _) = watch::channel(0);
        Self {
            reminders: Mutex::new(HashMap::new()),
            plants: Mutex::new(HashMap::new()),
            reminder_revision,
            plant_revision,
        }
    }

    /// Stands in for the external writer that owns plant records.
    pub async fn upsert_plant(&self, plant: Plant) {
        self.plants.lock().await.insert(plant.id, plant);
        self.plant_revision.send_modify(|rev| *rev += 1);
    }

    pub async fn remove_plant(&self, id: Uuid) -> Option<Plant> {
        let removed = self.plants.lock().await.remove(&id);
        if removed.is_some() {
            self.plant_revision.send_modify(|rev| *rev += 1);
        }
        removed
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn list(&self, query: &ReminderQuery) -> Result<Vec<Reminder>, StoreError> {
        let reminders = self.reminders.lock().await;
        let mut matching: Vec<Reminder> = reminders
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Reminder>, StoreError> {
        Ok(self.reminders.lock().await.get(&id).cloned())
    }

    async fn insert(&self, reminder: Reminder) -> Result<Reminder, StoreError> {
        self.reminders
            .lock()
            .await
            .insert(reminder.id, reminder.clone());
        self.reminder_revision.send_modify(|rev| *rev += 1);
        Ok(reminder)
    }

    async fn update(&self, id: Uuid, mutator: ReminderMutator) -> Result<Mutation, StoreError> {
        let mut reminders = self.reminders.lock().await;
        let stored = reminders.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "reminder",
            id,
        })?;

        // The stored record is replaced only when the mutator reports a change.
        let mut draft = stored.clone();
        let changed = mutator(&mut draft);
        if changed {
            *stored = draft.clone();
        }
        drop(reminders);

        if changed {
            self.reminder_revision.send_modify(|rev| *rev += 1);
        }
        Ok(Mutation {
            reminder: draft,
            changed,
        })
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.reminder_revision.subscribe()
    }
}

#[async_trait]
impl PlantStore for MemoryStore {
    async fn list_plants(&self) -> Result<Vec<Plant>, StoreError> {
        let mut plants: Vec<Plant> = self.plants.lock().await.values().cloned().collect();
        plants.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(plants)
    }

    async fn find_plant(&self, id: Uuid) -> Result<Option<Plant>, StoreError> {
        Ok(self.plants.lock().await.get(&id).cloned())
    }

    fn plant_changes(&self) -> watch::Receiver<u64> {
        self.plant_revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::testing::{plant, reminder_for};
    use crate::store::mutator;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn list_is_sorted_by_due_date_and_filtered() {
        let store = MemoryStore::new();
        let p = plant("Basil");
        let now = Utc::now();
        let later = store.insert(reminder_for(&p, now + Duration::days(2))).await.unwrap();
        let sooner = store.insert(reminder_for(&p, now + Duration::days(1))).await.unwrap();
        let mut done = reminder_for(&p, now);
        done.is_completed = true;
        let done = store.insert(done).await.unwrap();

        let active = store.list(&ReminderQuery::active()).await.unwrap();
        assert_eq!(active, vec![sooner, later]);

        let completed = store.list(&ReminderQuery::completed()).await.unwrap();
        assert_eq!(completed, vec![done]);
    }

    #[tokio::test]
    async fn unchanged_update_does_not_bump_revision() {
        let store = MemoryStore::new();
        let p = plant("Mint");
        let r = store.insert(reminder_for(&p, Utc::now())).await.unwrap();
        let changes = store.changes();
        let before = *changes.borrow();

        let outcome = store.update(r.id, mutator(|_| false)).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(*changes.borrow(), before);

        let outcome = store
            .update(
                r.id,
                mutator(|r| {
                    r.is_completed = true;
                    true
                }),
            )
            .await
            .unwrap();
        assert!(outcome.changed);
        assert!(outcome.reminder.is_completed);
        assert_eq!(*changes.borrow(), before + 1);
    }

    #[tokio::test]
    async fn soft_delete_hides_the_reminder_once() {
        let store = MemoryStore::new();
        let p = plant("Fern");
        let r = store.insert(reminder_for(&p, Utc::now())).await.unwrap();

        assert!(store.soft_delete(r.id).await.unwrap().changed);
        assert!(!store.soft_delete(r.id).await.unwrap().changed);
        assert!(store.list(&ReminderQuery::active()).await.unwrap().is_empty());
        assert!(store.find(r.id).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update(Uuid::new_v4(), mutator(|_| true)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "reminder", .. }));
    }
}
