//! Reminder commands: mark-done, snooze, reschedule, intake and discard,
//! single and batched.
//!
//! Every command awaits its storage mutation and nothing else. Notification
//! work is queued on a [`TaskTracker`] once the mutation has committed, and
//! its failures only show up in logs, metrics and [`side_effect_failures`].
//! Notification work for one reminder runs one job at a time and always acts
//! on the stored record, so a slow job cannot undo a later command.
//!
//! [`side_effect_failures`]: BatchActionCoordinator::side_effect_failures

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::care::schedule::DEFAULT_MIN_LEAD_MINUTES;
use crate::care::{validate, Calendar, DeviceZone, Reminder, ReminderState, ReminderType};
use crate::error::{ActionError, NotificationError, StoreError};
use crate::notifications::{NotificationScheduler, NotificationTemplates};
use crate::store::{mutator, Mutation, PlantStore, ReminderMutator, ReminderStore};

/// Intake payload for a reminder created by the scheduling trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReminder {
    pub plant_id: Uuid,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub scheduled_for: DateTime<Utc>,
}

/// Outcome of one id within a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub id: Uuid,
    pub outcome: Result<Reminder, ActionError>,
}

/// Per-item outcomes of a batch command, in request order (duplicates removed).
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &Reminder> {
        self.items.iter().filter_map(|item| item.outcome.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (Uuid, &ActionError)> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref().err().map(|e| (item.id, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Shift {
    By(u32),
    To(DateTime<Utc>),
}

pub struct BatchActionCoordinator<Tz: TimeZone> {
    reminders: Arc<dyn ReminderStore>,
    plants: Arc<dyn PlantStore>,
    notifier: Arc<dyn NotificationScheduler>,
    calendar: Calendar<Tz>,
    min_lead_minutes: i64,
    side_effects: TaskTracker,
    side_effect_failures: Arc<AtomicUsize>,
    notification_locks: Arc<NotificationLocks>,
}

impl<Tz> BatchActionCoordinator<Tz>
where
    Tz: DeviceZone,
{
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        plants: Arc<dyn PlantStore>,
        notifier: Arc<dyn NotificationScheduler>,
        calendar: Calendar<Tz>,
    ) -> Self {
        Self {
            reminders,
            plants,
            notifier,
            calendar,
            min_lead_minutes: DEFAULT_MIN_LEAD_MINUTES,
            side_effects: TaskTracker::new(),
            side_effect_failures: Arc::new(AtomicUsize::new(0)),
            notification_locks: Arc::new(NotificationLocks::default()),
        }
    }

    pub fn with_min_lead_minutes(mut self, minutes: i64) -> Self {
        self.min_lead_minutes = minutes.max(0);
        self
    }

    pub fn calendar(&self) -> &Calendar<Tz> {
        &self.calendar
    }

    pub fn reminder_store(&self) -> Arc<dyn ReminderStore> {
        self.reminders.clone()
    }

    pub fn plant_store(&self) -> Arc<dyn PlantStore> {
        self.plants.clone()
    }

    /// Notification side effects that have failed since startup.
    pub fn side_effect_failures(&self) -> usize {
        self.side_effect_failures.load(Ordering::SeqCst)
    }

    /// Waits until every side effect queued so far has finished.
    pub async fn flush_side_effects(&self) {
        self.side_effects.close();
        self.side_effects.wait().await;
        self.side_effects.reopen();
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Completes a reminder, then cancels its notification. Completing an
    /// already completed reminder succeeds without touching anything.
    pub async fn mark_done(&self, id: Uuid) -> Result<Reminder, ActionError> {
        let mutation = self
            .persist(
                "mark_done",
                id,
                mutator(|r| {
                    if !r.is_active() {
                        return false;
                    }
                    r.is_completed = true;
                    true
                }),
            )
            .await?;

        let reminder = mutation.reminder;
        if reminder.is_deleted {
            return Err(ActionError::NotFound(id));
        }
        if mutation.changed {
            info!(reminder_id = %id, plant_id = %reminder.plant_id, "✅ Reminder completed");
            crate::metrics::increment_reminders_completed();
            self.sync_notification(id);
        } else {
            debug!(reminder_id = %id, "Reminder already completed");
        }
        Ok(reminder)
    }

    pub async fn batch_mark_done(&self, ids: &[Uuid]) -> BatchReport {
        let ids = distinct(ids);
        let items = join_all(ids.into_iter().map(|id| async move {
            BatchItem {
                id,
                outcome: self.mark_done(id).await,
            }
        }))
        .await;
        summarize("mark_done", BatchReport { items })
    }

    /// Pushes the due date `days` calendar days forward from its current
    /// value and re-schedules the notification.
    pub async fn snooze(&self, id: Uuid, days: u32) -> Result<Reminder, ActionError> {
        self.shift("snooze", id, Shift::By(days)).await
    }

    pub async fn batch_snooze(&self, ids: &[Uuid], days: u32) -> BatchReport {
        let ids = distinct(ids);
        let items = join_all(ids.into_iter().map(|id| async move {
            BatchItem {
                id,
                outcome: self.snooze(id, days).await,
            }
        }))
        .await;
        summarize("snooze", BatchReport { items })
    }

    /// Moves the due date to `target`, or one day forward when no target is
    /// given.
    pub async fn reschedule(
        &self,
        id: Uuid,
        target: Option<DateTime<Utc>>,
    ) -> Result<Reminder, ActionError> {
        let shift = match target {
            Some(target) => Shift::To(target),
            None => Shift::By(1),
        };
        self.shift("reschedule", id, shift).await
    }

    /// Validates and stores a new reminder, then schedules its notification.
    pub async fn register(&self, new: NewReminder) -> Result<Reminder, ActionError> {
        let now = self.calendar.now();
        let scheduled_for = validate(
            new.scheduled_for,
            0,
            self.min_lead_minutes,
            now,
            self.calendar.tz(),
        )
        .map_err(|e| {
            crate::metrics::increment_validation_rejections(e.code());
            ActionError::from(e)
        })?;

        match self.plants.find_plant(new.plant_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ActionError::PlantNotFound(new.plant_id)),
            Err(e) => return Err(storage_failure("register", new.plant_id, e)),
        }

        let mut reminder = Reminder::new(new.plant_id, new.reminder_type, scheduled_for);
        reminder.title = new.title;
        reminder.description = new.description;
        let id = reminder.id;

        let store = self.reminders.clone();
        let reminder = tokio::spawn(async move { store.insert(reminder).await })
            .await
            .map_err(|e| StoreError::Aborted(e.to_string()))
            .and_then(|inserted| inserted)
            .map_err(|e| storage_failure("register", id, e))?;

        info!(reminder_id = %id, plant_id = %reminder.plant_id, scheduled_for = %reminder.scheduled_for, "📝 Reminder registered");
        crate::metrics::increment_reminders_registered();
        self.sync_notification(reminder.id);
        Ok(reminder)
    }

    /// Soft-deletes a reminder and cancels its notification. Discarding a
    /// deleted reminder again is a no-op.
    pub async fn discard(&self, id: Uuid) -> Result<Reminder, ActionError> {
        let store = self.reminders.clone();
        let mutation = tokio::spawn(async move { store.soft_delete(id).await })
            .await
            .map_err(|e| StoreError::Aborted(e.to_string()))
            .and_then(|deleted| deleted)
            .map_err(|e| storage_failure("discard", id, e))?;

        if mutation.changed {
            info!(reminder_id = %id, "🗑️ Reminder discarded");
            crate::metrics::increment_reminders_discarded(mutation.reminder.is_completed);
            self.sync_notification(id);
        }
        Ok(mutation.reminder)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn shift(
        &self,
        operation: &'static str,
        id: Uuid,
        shift: Shift,
    ) -> Result<Reminder, ActionError> {
        let now = self.calendar.now();
        let tz = self.calendar.tz().clone();
        let lead = self.min_lead_minutes;
        let (verdict_tx, verdict_rx) = oneshot::channel();

        // The target is computed from the record as read inside the store's
        // transaction, so concurrent snoozes compound instead of racing.
        let mutation = self
            .persist(
                operation,
                id,
                mutator(move |r| {
                    let verdict = plan_shift(r, shift, lead, now, &tz);
                    let changed = match &verdict {
                        Ok(target) if *target != r.scheduled_for => {
                            r.scheduled_for = *target;
                            true
                        }
                        _ => false,
                    };
                    let _ = verdict_tx.send(verdict);
                    changed
                }),
            )
            .await?;

        match verdict_rx.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                if let ActionError::Validation(v) = &e {
                    crate::metrics::increment_validation_rejections(v.code());
                }
                debug!(reminder_id = %id, operation, error = %e, "Shift rejected");
                return Err(e);
            }
            Err(_) => {
                return Err(storage_failure(
                    operation,
                    id,
                    StoreError::Aborted("store did not run the mutation".into()),
                ))
            }
        }

        let reminder = mutation.reminder;
        if mutation.changed {
            info!(reminder_id = %id, operation, scheduled_for = %reminder.scheduled_for, "⏰ Reminder moved");
            crate::metrics::increment_reminders_snoozed();
            self.sync_notification(reminder.id);
        }
        Ok(reminder)
    }

    /// Runs the storage mutation on its own task so that it completes even if
    /// the caller goes away.
    async fn persist(
        &self,
        operation: &'static str,
        id: Uuid,
        mutator: ReminderMutator,
    ) -> Result<Mutation, ActionError> {
        let store = self.reminders.clone();
        tokio::spawn(async move { store.update(id, mutator).await })
            .await
            .map_err(|e| StoreError::Aborted(e.to_string()))
            .and_then(|updated| updated)
            .map_err(|e| storage_failure(operation, id, e))
    }

    /// Brings the notification for `id` in line with the stored reminder.
    /// Runs for one id never overlap and each reads the record once it holds
    /// the id's lock, so the last run sees the last committed mutation.
    fn sync_notification(&self, id: Uuid) {
        let reminders = self.reminders.clone();
        let plants = self.plants.clone();
        let notifier = self.notifier.clone();
        let failures = self.side_effect_failures.clone();
        let locks = self.notification_locks.clone();
        self.side_effects.spawn(async move {
            let slot = locks.acquire(id).await;
            let guard = slot.lock().await;
            if let Err((kind, e)) =
                apply_notification(&*reminders, &*plants, &*notifier, id).await
            {
                record_side_effect_failure(&failures, kind, id, &e);
            }
            drop(guard);
            locks.release(id, slot).await;
        });
    }
}

/// One lock per reminder id with queued notification work.
#[derive(Default)]
struct NotificationLocks {
    slots: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl NotificationLocks {
    async fn acquire(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.slots.lock().await.entry(id).or_default().clone()
    }

    /// Drops the id's entry once no other run holds it.
    async fn release(&self, id: Uuid, slot: Arc<Mutex<()>>) {
        let mut slots = self.slots.lock().await;
        // Map entry plus `slot`.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(&id);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

async fn apply_notification(
    reminders: &dyn ReminderStore,
    plants: &dyn PlantStore,
    notifier: &dyn NotificationScheduler,
    id: Uuid,
) -> Result<(), (&'static str, Box<dyn fmt::Display + Send>)> {
    let reminder = match reminders.find(id).await {
        Ok(Some(reminder)) if reminder.is_active() => reminder,
        Ok(_) => {
            return notifier
                .cancel(id)
                .await
                .map_err(|e| ("cancel", boxed(e)))
        }
        Err(e) => return Err(("schedule", boxed(e))),
    };

    let plant_name = match plants.find_plant(reminder.plant_id).await {
        Ok(Some(plant)) => plant.name,
        Ok(None) => {
            let e = NotificationError::MissingContent(format!(
                "plant {} not found",
                reminder.plant_id
            ));
            return Err(("schedule", boxed(e)));
        }
        Err(e) => return Err(("schedule", boxed(e))),
    };
    let content = NotificationTemplates::reminder(&reminder, &plant_name);
    notifier
        .schedule(reminder.id, content, reminder.scheduled_for)
        .await
        .map_err(|e| ("schedule", boxed(e)))
}

fn boxed<E: fmt::Display + Send + 'static>(e: E) -> Box<dyn fmt::Display + Send> {
    Box::new(e)
}

fn plan_shift<Tz: TimeZone>(
    reminder: &Reminder,
    shift: Shift,
    minimum_lead_minutes: i64,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<DateTime<Utc>, ActionError> {
    match reminder.state() {
        ReminderState::Scheduled => {}
        ReminderState::Deleted => return Err(ActionError::NotFound(reminder.id)),
        state @ ReminderState::Completed => {
            return Err(ActionError::Terminal {
                id: reminder.id,
                state,
            })
        }
    }
    let target = match shift {
        Shift::By(days) => validate(reminder.scheduled_for, days, minimum_lead_minutes, now, tz)?,
        Shift::To(target) => validate(target, 0, minimum_lead_minutes, now, tz)?,
    };
    Ok(target)
}

fn distinct(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn storage_failure(operation: &'static str, id: Uuid, e: StoreError) -> ActionError {
    if !matches!(e, StoreError::NotFound { .. }) {
        error!(reminder_id = %id, operation, error = %e, "❌ Storage mutation failed");
        crate::metrics::increment_storage_failures(operation);
    }
    ActionError::from(e)
}

fn record_side_effect_failure(
    failures: &AtomicUsize,
    kind: &'static str,
    id: Uuid,
    error: &dyn fmt::Display,
) {
    failures.fetch_add(1, Ordering::SeqCst);
    crate::metrics::increment_side_effect_failures(kind);
    warn!(reminder_id = %id, kind, error = %error, "⚠️ Notification side effect failed");
}

fn summarize(operation: &'static str, report: BatchReport) -> BatchReport {
    let failed = report.failure_count();
    if failed > 0 {
        warn!(
            operation,
            total = report.items.len(),
            failed,
            "Batch finished with failures"
        );
    } else {
        info!(operation, total = report.items.len(), "Batch finished");
    }
    report
}
