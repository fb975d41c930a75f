//! Top-level orchestration: keeps a derived [`CareSnapshot`] in step with the
//! live reminder and plant collections and routes user commands to the
//! [`BatchActionCoordinator`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::batch::{BatchActionCoordinator, BatchReport, NewReminder};
use super::selection::Selection;
use crate::care::{
    aggregate_all, group, DeviceZone, GroupedReminders, Plant, PlantAttentionStatus, Reminder,
    ReminderState,
};
use crate::error::{ActionError, StoreError};
use crate::store::{observe_plants, observe_reminders, ReminderQuery};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the UI renders, derived from one consistent read of reminders
/// and plants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareSnapshot {
    pub grouped: GroupedReminders,
    pub attention: Vec<PlantAttentionStatus>,
    pub orphaned_reminders: Vec<Uuid>,
    pub computed_at: DateTime<Utc>,
}

impl CareSnapshot {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            grouped: GroupedReminders::default(),
            attention: Vec::new(),
            orphaned_reminders: Vec::new(),
            computed_at: now,
        }
    }

    fn same_content(&self, other: &CareSnapshot) -> bool {
        self.grouped == other.grouped
            && self.attention == other.attention
            && self.orphaned_reminders == other.orphaned_reminders
    }

    pub fn attention_for(&self, plant_id: Uuid) -> Option<&PlantAttentionStatus> {
        self.attention.iter().find(|s| s.plant_id == plant_id)
    }
}

/// Stops the refresher when dropped.
pub struct ControllerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Care snapshot refresher ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct ReminderLifecycleController<Tz: TimeZone> {
    coordinator: Arc<BatchActionCoordinator<Tz>>,
    snapshot: watch::Sender<CareSnapshot>,
    selection: Mutex<Selection>,
    /// Held from the store read to the end of `publish`, and by `select`.
    refresh_lock: Mutex<()>,
    refresh_interval: Duration,
}

impl<Tz> ReminderLifecycleController<Tz>
where
    Tz: DeviceZone,
{
    pub fn new(coordinator: Arc<BatchActionCoordinator<Tz>>) -> Self {
        let (snapshot, _) = watch::channel(CareSnapshot::empty(coordinator.calendar().now()));
        Self {
            coordinator,
            snapshot,
            selection: Mutex::new(Selection::default()),
            refresh_lock: Mutex::new(()),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Period of the recompute that happens without any data change, which
    /// is what moves reminders between buckets as days roll over.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn coordinator(&self) -> &Arc<BatchActionCoordinator<Tz>> {
        &self.coordinator
    }

    /// Subscribes to live reminders and plants and keeps the snapshot
    /// current until the returned handle is dropped. The feeds only signal
    /// that something changed; every publish re-reads the store.
    pub async fn start(self: &Arc<Self>) -> Result<ControllerHandle, StoreError> {
        let mut reminders = observe_reminders(
            self.coordinator.reminder_store(),
            ReminderQuery::active(),
        )
        .await?;
        let mut plants = observe_plants(self.coordinator.plant_store()).await?;
        self.refresh().await?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let task = tokio::spawn(async move {
            info!(
                refresh_secs = controller.refresh_interval.as_secs_f64(),
                "Care snapshot refresher started"
            );
            let mut ticker = tokio::time::interval(controller.refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    alive = reminders.changed() => {
                        if !alive {
                            warn!("Reminder feed closed");
                            break;
                        }
                    }
                    alive = plants.changed() => {
                        if !alive {
                            warn!("Plant feed closed");
                            break;
                        }
                    }
                    _ = ticker.tick() => {}
                }
                if let Err(e) = controller.refresh().await {
                    warn!(error = %e, "Care snapshot refresh failed; retrying on the next change");
                }
            }
            info!("Care snapshot refresher stopped");
        });

        Ok(ControllerHandle { cancel, task })
    }

    /// Re-reads both collections and republishes. Used after commands so
    /// readers see their own writes without waiting for the feed.
    pub async fn refresh(&self) -> Result<CareSnapshot, StoreError> {
        let _guard = self.refresh_lock.lock().await;
        let reminders = self
            .coordinator
            .reminder_store()
            .list(&ReminderQuery::active())
            .await?;
        let plants = self.coordinator.plant_store().list_plants().await?;
        self.publish(&reminders, &plants).await;
        Ok(self.snapshot())
    }

    fn compute(&self, reminders: &[Reminder], plants: &[Plant]) -> CareSnapshot {
        let calendar = self.coordinator.calendar();
        let now = calendar.now();
        let grouped = group(reminders, now, calendar.tz());
        let report = aggregate_all(plants, reminders, now, calendar.tz());
        CareSnapshot {
            grouped,
            attention: report.statuses,
            orphaned_reminders: report.orphaned_reminders,
            computed_at: now,
        }
    }

    async fn publish(&self, reminders: &[Reminder], plants: &[Plant]) {
        let next = self.compute(reminders, plants);
        crate::metrics::record_snapshot(&next);

        let published = self.snapshot.send_if_modified(|current| {
            if current.same_content(&next) {
                current.computed_at = next.computed_at;
                false
            } else {
                *current = next;
                true
            }
        });
        if published {
            debug!(active = reminders.len(), plants = plants.len(), "Care snapshot updated");
        }

        let active: HashSet<Uuid> = reminders.iter().map(|r| r.id).collect();
        let pruned = self.selection.lock().await.retain_active(&active);
        if pruned > 0 {
            debug!(pruned, "Dropped finished reminders from the selection");
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> CareSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CareSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn grouped_reminders(&self) -> GroupedReminders {
        self.snapshot.borrow().grouped.clone()
    }

    pub fn attention_statuses(&self) -> Vec<PlantAttentionStatus> {
        self.snapshot.borrow().attention.clone()
    }

    pub fn attention_status(&self, plant_id: Uuid) -> Option<PlantAttentionStatus> {
        self.snapshot.borrow().attention_for(plant_id).cloned()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn mark_done(&self, id: Uuid) -> Result<Reminder, ActionError> {
        let result = self.coordinator.mark_done(id).await;
        self.settle().await;
        result
    }

    pub async fn snooze(&self, id: Uuid, days: u32) -> Result<Reminder, ActionError> {
        let result = self.coordinator.snooze(id, days).await;
        self.settle().await;
        result
    }

    pub async fn reschedule(
        &self,
        id: Uuid,
        target: Option<DateTime<Utc>>,
    ) -> Result<Reminder, ActionError> {
        let result = self.coordinator.reschedule(id, target).await;
        self.settle().await;
        result
    }

    pub async fn register(&self, new: NewReminder) -> Result<Reminder, ActionError> {
        let result = self.coordinator.register(new).await;
        self.settle().await;
        result
    }

    pub async fn discard(&self, id: Uuid) -> Result<Reminder, ActionError> {
        let result = self.coordinator.discard(id).await;
        self.settle().await;
        result
    }

    /// Completes `ids`. A finished batch action always clears the selection.
    pub async fn batch_mark_done(&self, ids: &[Uuid]) -> BatchReport {
        let report = self.coordinator.batch_mark_done(ids).await;
        self.selection.lock().await.take();
        self.settle().await;
        report
    }

    pub async fn batch_snooze(&self, ids: &[Uuid], days: u32) -> BatchReport {
        let report = self.coordinator.batch_snooze(ids, days).await;
        self.selection.lock().await.take();
        self.settle().await;
        report
    }

    pub async fn mark_selection_done(&self) -> BatchReport {
        let ids = self.selection.lock().await.take();
        self.batch_mark_done(&ids).await
    }

    pub async fn snooze_selection(&self, days: u32) -> BatchReport {
        let ids = self.selection.lock().await.take();
        self.batch_snooze(&ids, days).await
    }

    async fn settle(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Snapshot refresh after command failed; the live feed will catch up");
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub async fn selection(&self) -> Selection {
        self.selection.lock().await.clone()
    }

    pub async fn set_batch_mode(&self, enabled: bool) -> Selection {
        let mut selection = self.selection.lock().await;
        selection.set_batch_mode(enabled);
        selection.clone()
    }

    /// Adds an active reminder to the selection.
    pub async fn select(&self, id: Uuid) -> Result<Selection, ActionError> {
        // A refresh that read the store before this lookup must not prune
        // the id after it is added.
        let _guard = self.refresh_lock.lock().await;
        let reminder = self
            .coordinator
            .reminder_store()
            .find(id)
            .await?
            .ok_or(ActionError::NotFound(id))?;
        match reminder.state() {
            ReminderState::Scheduled => {}
            ReminderState::Deleted => return Err(ActionError::NotFound(id)),
            state @ ReminderState::Completed => return Err(ActionError::Terminal { id, state }),
        }

        let mut selection = self.selection.lock().await;
        selection.add(id);
        Ok(selection.clone())
    }

    pub async fn deselect(&self, id: Uuid) -> Selection {
        let mut selection = self.selection.lock().await;
        selection.remove(id);
        selection.clone()
    }

    pub async fn clear_selection(&self) -> Selection {
        let mut selection = self.selection.lock().await;
        selection.clear();
        selection.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::testing::{plant, reminder_for, FixedClock};
    use crate::care::{AttentionReason, Calendar, PriorityLevel};
    use crate::notifications::LocalNotifier;
    use crate::store::{MemoryStore, ReminderStore};
    use chrono::Duration as ChronoDuration;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        controller: Arc<ReminderLifecycleController<Utc>>,
    }

    fn fixture(refresh: Duration) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(noon()));
        let calendar = Calendar::new(Utc, clock.clone());
        let coordinator = Arc::new(BatchActionCoordinator::new(
            store.clone(),
            store.clone(),
            Arc::new(LocalNotifier::new()),
            calendar,
        ));
        let controller =
            Arc::new(ReminderLifecycleController::new(coordinator).with_refresh_interval(refresh));
        Fixture {
            store,
            clock,
            controller,
        }
    }

    async fn next_snapshot(rx: &mut watch::Receiver<CareSnapshot>) -> CareSnapshot {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("snapshot in time")
            .expect("sender alive");
        rx.borrow_and_update().clone()
    }

    #[tokio::test]
    async fn start_publishes_grouping_and_attention() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let mut p = plant("Basil");
        p.health_percentage = 10;
        f.store.upsert_plant(p.clone()).await;
        let overdue = f
            .store
            .insert(reminder_for(&p, noon() - ChronoDuration::days(2)))
            .await
            .unwrap();

        let _handle = f.controller.start().await.unwrap();

        let grouped = f.controller.grouped_reminders();
        assert_eq!(grouped.urgent.len(), 1);
        assert_eq!(grouped.urgent[0].reminder.id, overdue.id);

        let status = f.controller.attention_status(p.id).unwrap();
        assert_eq!(status.priority_level, PriorityLevel::Urgent);
        assert_eq!(
            status.reasons,
            vec![AttentionReason::OverdueTask, AttentionReason::CriticalHealth]
        );
    }

    #[tokio::test]
    async fn external_writes_flow_into_the_snapshot() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let p = plant("Mint");
        f.store.upsert_plant(p.clone()).await;
        let _handle = f.controller.start().await.unwrap();
        let mut rx = f.controller.subscribe();

        f.store
            .insert(reminder_for(&p, noon() + ChronoDuration::hours(2)))
            .await
            .unwrap();

        let snapshot = next_snapshot(&mut rx).await;
        assert_eq!(snapshot.grouped.high.len(), 1);
        assert!(snapshot.attention_for(p.id).unwrap().needs_attention);
    }

    #[tokio::test]
    async fn orphaned_reminders_are_reported() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let ghost = plant("Ghost");
        let orphan = f
            .store
            .insert(reminder_for(&ghost, noon() + ChronoDuration::days(1)))
            .await
            .unwrap();

        let _handle = f.controller.start().await.unwrap();

        let snapshot = f.controller.snapshot();
        assert_eq!(snapshot.orphaned_reminders, vec![orphan.id]);
        assert!(snapshot.attention.is_empty());
        assert_eq!(snapshot.grouped.len(), 1);
    }

    #[tokio::test]
    async fn mark_done_is_visible_immediately() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let p = plant("Fern");
        f.store.upsert_plant(p.clone()).await;
        let r = f
            .store
            .insert(reminder_for(&p, noon() + ChronoDuration::hours(1)))
            .await
            .unwrap();
        let _handle = f.controller.start().await.unwrap();

        f.controller.mark_done(r.id).await.unwrap();

        assert!(f.controller.grouped_reminders().is_empty());
        assert!(!f.controller.attention_status(p.id).unwrap().needs_attention);
    }

    #[tokio::test]
    async fn periodic_tick_rolls_buckets_over_midnight() {
        let f = fixture(Duration::from_millis(20));
        let p = plant("Aloe");
        f.store.upsert_plant(p.clone()).await;
        let tomorrow_morning = Utc.with_ymd_and_hms(2026, 6, 2, 9, 0, 0).unwrap();
        f.store.insert(reminder_for(&p, tomorrow_morning)).await.unwrap();

        let _handle = f.controller.start().await.unwrap();
        assert_eq!(f.controller.grouped_reminders().medium.len(), 1);

        let mut rx = f.controller.subscribe();
        f.clock.set(Utc.with_ymd_and_hms(2026, 6, 2, 0, 30, 0).unwrap());

        let snapshot = next_snapshot(&mut rx).await;
        assert_eq!(snapshot.grouped.high.len(), 1);
        assert!(snapshot.grouped.medium.is_empty());
    }

    #[tokio::test]
    async fn selection_is_cleared_by_batch_actions_and_mode_changes() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let p = plant("Ivy");
        f.store.upsert_plant(p.clone()).await;
        let a = f
            .store
            .insert(reminder_for(&p, noon() + ChronoDuration::days(1)))
            .await
            .unwrap();
        let b = f
            .store
            .insert(reminder_for(&p, noon() + ChronoDuration::days(2)))
            .await
            .unwrap();
        let _handle = f.controller.start().await.unwrap();

        f.controller.select(a.id).await.unwrap();
        let selection = f.controller.set_batch_mode(false).await;
        assert!(selection.is_empty());

        f.controller.select(a.id).await.unwrap();
        let selection = f.controller.select(b.id).await.unwrap();
        assert_eq!(selection.ids(), &[a.id, b.id]);

        let report = f.controller.mark_selection_done().await;
        assert!(report.all_succeeded());
        assert_eq!(report.items.len(), 2);
        assert_eq!(f.controller.selection().await, Selection::default());
        assert!(f.store.find(a.id).await.unwrap().unwrap().is_completed);
        assert!(f.store.find(b.id).await.unwrap().unwrap().is_completed);
    }

    #[tokio::test]
    async fn fresh_reminder_stays_selected_while_the_refresher_runs() {
        let f = fixture(Duration::from_millis(5));
        let p = plant("Pothos");
        f.store.upsert_plant(p.clone()).await;
        let _handle = f.controller.start().await.unwrap();

        for day in 1..=5 {
            let r = f
                .store
                .insert(reminder_for(&p, noon() + ChronoDuration::days(day)))
                .await
                .unwrap();
            f.controller.select(r.id).await.unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;

            let selection = f.controller.selection().await;
            assert!(selection.contains(r.id), "reminder {day} was pruned");
            assert_eq!(f.controller.grouped_reminders().len(), day as usize);
        }
        assert_eq!(f.controller.selection().await.ids().len(), 5);
    }

    #[tokio::test]
    async fn completed_reminders_cannot_be_selected() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let p = plant("Ivy");
        f.store.upsert_plant(p.clone()).await;
        let r = f
            .store
            .insert(reminder_for(&p, noon() + ChronoDuration::days(1)))
            .await
            .unwrap();
        f.controller.mark_done(r.id).await.unwrap();

        let err = f.controller.select(r.id).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        let err = f.controller.select(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_refresher() {
        let f = fixture(DEFAULT_REFRESH_INTERVAL);
        let handle = f.controller.start().await.unwrap();
        let token = handle.cancel.clone();
        drop(handle);
        assert!(token.is_cancelled());

        let handle = f.controller.start().await.unwrap();
        handle.shutdown().await;
    }
}
