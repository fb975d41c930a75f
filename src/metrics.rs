use crate::care::PriorityLevel;
use crate::reminders::CareSnapshot;
use crate::store::{ReminderQuery, ReminderStore};

pub async fn init_metrics(reminders: &dyn ReminderStore) {
    let active = reminders
        .list(&ReminderQuery::active())
        .await
        .map(|r| r.len())
        .unwrap_or(0);
    metrics::gauge!("plantpulse_reminders_active").set(active as f64);

    let completed = reminders
        .list(&ReminderQuery::completed())
        .await
        .map(|r| r.len())
        .unwrap_or(0);
    metrics::gauge!("plantpulse_reminders_completed").set(completed as f64);

    tracing::info!(
        "Initialized metrics: ActiveReminders={}, CompletedReminders={}",
        active,
        completed
    );
}

pub fn increment_reminders_completed() {
    metrics::counter!("plantpulse_reminders_completed_total").increment(1);
    metrics::gauge!("plantpulse_reminders_completed").increment(1.0);
}

pub fn increment_reminders_snoozed() {
    metrics::counter!("plantpulse_reminders_snoozed_total").increment(1);
}

pub fn increment_reminders_registered() {
    metrics::counter!("plantpulse_reminders_registered_total").increment(1);
}

/// Discarding a completed reminder takes it out of the completed gauge.
pub fn increment_reminders_discarded(was_completed: bool) {
    metrics::counter!("plantpulse_reminders_discarded_total").increment(1);
    if was_completed {
        metrics::gauge!("plantpulse_reminders_completed").decrement(1.0);
    }
}

pub fn increment_validation_rejections(code: &'static str) {
    metrics::counter!("plantpulse_validation_rejections_total", "code" => code).increment(1);
}

pub fn increment_storage_failures(operation: &'static str) {
    metrics::counter!("plantpulse_storage_failures_total", "operation" => operation).increment(1);
}

pub fn increment_side_effect_failures(kind: &'static str) {
    metrics::counter!("plantpulse_side_effect_failures_total", "kind" => kind).increment(1);
}

pub fn increment_notifications_delivered() {
    metrics::counter!("plantpulse_notifications_delivered_total").increment(1);
}

/// Published after every recomputation of the care snapshot.
pub fn record_snapshot(snapshot: &CareSnapshot) {
    for level in PriorityLevel::DESCENDING {
        metrics::gauge!("plantpulse_reminders_by_priority", "level" => level.as_str())
            .set(snapshot.grouped.bucket(level).len() as f64);

        let plants = snapshot
            .attention
            .iter()
            .filter(|s| s.needs_attention && s.priority_level == level)
            .count();
        metrics::gauge!("plantpulse_plants_needing_attention", "level" => level.as_str())
            .set(plants as f64);
    }
    metrics::gauge!("plantpulse_reminders_active").set(snapshot.grouped.len() as f64);
    metrics::gauge!("plantpulse_orphaned_reminders").set(snapshot.orphaned_reminders.len() as f64);
}
