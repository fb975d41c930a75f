//! Storage collaborator seam.
//!
//! Stores expose plain CRUD plus a revision counter. [`observe`] turns any
//! fetch into a live stream that re-runs whenever the revision moves.

pub mod memory;
pub mod sea;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::care::{Plant, Reminder};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sea::SeaOrmStore;

/// Mutates a reminder in place inside the store's transaction. Returns
/// whether anything changed; unchanged records are not written back.
pub type ReminderMutator = Box<dyn FnOnce(&mut Reminder) -> bool + Send>;

pub fn mutator<F>(f: F) -> ReminderMutator
where
    F: FnOnce(&mut Reminder) -> bool + Send + 'static,
{
    Box::new(f)
}

/// Which slice of the reminder collection to read. Deleted reminders are
/// never returned. Results are ordered by `scheduled_for` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderQuery {
    pub completed: bool,
    pub plant_id: Option<Uuid>,
}

impl ReminderQuery {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn completed() -> Self {
        Self {
            completed: true,
            plant_id: None,
        }
    }

    pub fn for_plant(mut self, plant_id: Uuid) -> Self {
        self.plant_id = Some(plant_id);
        self
    }

    pub fn matches(&self, reminder: &Reminder) -> bool {
        !reminder.is_deleted
            && reminder.is_completed == self.completed
            && self.plant_id.map_or(true, |id| reminder.plant_id == id)
    }
}

/// Result of [`ReminderStore::update`].
#[derive(Debug, Clone)]
pub struct Mutation {
    pub reminder: Reminder,
    pub changed: bool,
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn list(&self, query: &ReminderQuery) -> Result<Vec<Reminder>, StoreError>;

    /// Looks a reminder up by id, including completed and deleted ones.
    async fn find(&self, id: Uuid) -> Result<Option<Reminder>, StoreError>;

    async fn insert(&self, reminder: Reminder) -> Result<Reminder, StoreError>;

    /// Runs `mutator` against the current record atomically. Concurrent
    /// updates of the same id are serialized.
    async fn update(&self, id: Uuid, mutator: ReminderMutator) -> Result<Mutation, StoreError>;

    /// Moves a reminder to `Deleted`. Already deleted reminders are left as is.
    async fn soft_delete(&self, id: Uuid) -> Result<Mutation, StoreError> {
        self.update(
            id,
            mutator(|r| {
                if r.is_deleted {
                    return false;
                }
                r.is_deleted = true;
                true
            }),
        )
        .await
    }

    /// Revision counter, bumped after every committed change.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// Read-only access to plants.
#[async_trait]
pub trait PlantStore: Send + Sync {
    async fn list_plants(&self) -> Result<Vec<Plant>, StoreError>;

    async fn find_plant(&self, id: Uuid) -> Result<Option<Plant>, StoreError>;

    fn plant_changes(&self) -> watch::Receiver<u64>;
}

/// A live result set. The refresher task stops when this is dropped.
pub struct LiveQuery<T> {
    rx: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Clone> LiveQuery<T> {
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for the next emission, marking it seen. `false` once the
    /// refresher has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Latest emission, marking it seen.
    pub fn latest(&mut self) -> T {
        self.rx.borrow_and_update().clone()
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs `fetch` now and again after every revision bump, publishing only
/// results that differ from the previous one.
///
/// A failed refresh keeps the last good result.
pub async fn observe<T, F, Fut>(
    mut changes: watch::Receiver<u64>,
    fetch: F,
) -> Result<LiveQuery<T>, StoreError>
where
    T: PartialEq + Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, StoreError>> + Send,
{
    let _ = changes.borrow_and_update();
    let initial = fetch().await?;
    let (tx, rx) = watch::channel(initial);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    match fetch().await {
                        Ok(value) => {
                            tx.send_if_modified(|current| {
                                if *current == value {
                                    false
                                } else {
                                    *current = value;
                                    true
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Live query refresh failed; keeping last result");
                        }
                    }
                }
            }
        }
    });

    Ok(LiveQuery { rx, task })
}

pub async fn observe_reminders(
    store: Arc<dyn ReminderStore>,
    query: ReminderQuery,
) -> Result<LiveQuery<Vec<Reminder>>, StoreError> {
    let changes = store.changes();
    observe(changes, move || {
        let store = store.clone();
        let query = query.clone();
        async move { store.list(&query).await }
    })
    .await
}

pub async fn observe_plants(store: Arc<dyn PlantStore>) -> Result<LiveQuery<Vec<Plant>>, StoreError> {
    let changes = store.plant_changes();
    observe(changes, move || {
        let store = store.clone();
        async move { store.list_plants().await }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::testing::{plant, reminder_for};
    use chrono::{Duration, Utc};
    use std::time::Duration as StdDuration;

    #[test]
    fn query_filters_deleted_and_completion() {
        let p = plant("Basil");
        let mut r = reminder_for(&p, Utc::now());
        assert!(ReminderQuery::active().matches(&r));
        assert!(!ReminderQuery::completed().matches(&r));
        assert!(!ReminderQuery::active().for_plant(Uuid::new_v4()).matches(&r));

        r.is_completed = true;
        assert!(ReminderQuery::completed().for_plant(p.id).matches(&r));

        r.is_deleted = true;
        assert!(!ReminderQuery::completed().matches(&r));
    }

    #[tokio::test]
    async fn live_query_follows_store_changes() {
        let store = Arc::new(MemoryStore::new());
        let p = plant("Basil");
        store.upsert_plant(p.clone()).await;

        let mut live = observe_reminders(store.clone(), ReminderQuery::active())
            .await
            .unwrap();
        assert!(live.current().is_empty());

        let r = store
            .insert(reminder_for(&p, Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        tokio::time::timeout(StdDuration::from_secs(1), live.changed())
            .await
            .expect("live query should emit");
        assert_eq!(live.latest(), vec![r]);
    }

    #[tokio::test]
    async fn dropping_the_live_query_stops_the_refresher() {
        let store = Arc::new(MemoryStore::new());
        let live = observe_plants(store.clone()).await.unwrap();
        let task = live.task.abort_handle();
        drop(live);
        for _ in 0..100 {
            if task.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(task.is_finished());
    }
}
