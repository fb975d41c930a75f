//! Combines a plant's active reminders with its live health metrics into a
//! single [`PlantAttentionStatus`].
//!
//! The resulting priority is the maximum severity over every signal, never an
//! average. Reasons are ordered reminder-derived first, then health-derived,
//! each group most severe first, so identical inputs always render the same.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::priority::{DayBoundaries, PriorityLevel};
use super::{Plant, Reminder};

pub const CRITICAL_HEALTH_BELOW: i32 = 25;
pub const LOW_HEALTH_BELOW: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionReason {
    OverdueTask,
    DueToday,
    DueSoon,
    CriticalHealth,
    LowHealth,
    OverdueWatering,
    OverdueNutrients,
}

impl AttentionReason {
    pub fn code(&self) -> &'static str {
        match self {
            AttentionReason::OverdueTask => "overdue_task",
            AttentionReason::DueToday => "due_today",
            AttentionReason::DueSoon => "due_soon",
            AttentionReason::CriticalHealth => "critical_health",
            AttentionReason::LowHealth => "low_health",
            AttentionReason::OverdueWatering => "overdue_watering",
            AttentionReason::OverdueNutrients => "overdue_nutrients",
        }
    }

    fn for_reminder_bucket(level: PriorityLevel) -> Option<Self> {
        match level {
            PriorityLevel::Urgent => Some(AttentionReason::OverdueTask),
            PriorityLevel::High => Some(AttentionReason::DueToday),
            PriorityLevel::Medium => Some(AttentionReason::DueSoon),
            PriorityLevel::Low => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantAttentionStatus {
    pub plant_id: Uuid,
    pub needs_attention: bool,
    pub priority_level: PriorityLevel,
    pub reminder_count: usize,
    pub overdue_count: usize,
    pub due_today_count: usize,
    pub reasons: Vec<AttentionReason>,
}

/// Attention for a set of plants plus the reminders that pointed nowhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttentionReport {
    pub statuses: Vec<PlantAttentionStatus>,
    pub orphaned_reminders: Vec<Uuid>,
}

impl AttentionReport {
    pub fn for_plant(&self, plant_id: Uuid) -> Option<&PlantAttentionStatus> {
        self.statuses.iter().find(|s| s.plant_id == plant_id)
    }
}

/// Health-derived signals in their fixed display order.
fn health_signals(plant: &Plant) -> Vec<(PriorityLevel, AttentionReason)> {
    let mut signals = Vec::new();
    if plant.health_percentage < CRITICAL_HEALTH_BELOW {
        signals.push((PriorityLevel::Urgent, AttentionReason::CriticalHealth));
    } else if plant.health_percentage < LOW_HEALTH_BELOW {
        signals.push((PriorityLevel::High, AttentionReason::LowHealth));
    }
    if plant.next_watering_days <= 0 {
        signals.push((PriorityLevel::High, AttentionReason::OverdueWatering));
    }
    if plant.next_nutrient_days <= 0 {
        signals.push((PriorityLevel::Medium, AttentionReason::OverdueNutrients));
    }
    // stable: equal severities keep their declaration order
    signals.sort_by(|a, b| b.0.cmp(&a.0));
    signals
}

fn aggregate_with<'a, I>(plant: &Plant, reminders: I, boundaries: &DayBoundaries) -> PlantAttentionStatus
where
    I: IntoIterator<Item = &'a Reminder>,
{
    let mut reminder_count = 0;
    let mut overdue_count = 0;
    let mut due_today_count = 0;
    let mut buckets: HashSet<PriorityLevel> = HashSet::new();

    for reminder in reminders {
        if reminder.plant_id != plant.id || !reminder.is_active() {
            continue;
        }
        let level = boundaries.classify(reminder.scheduled_for);
        reminder_count += 1;
        match level {
            PriorityLevel::Urgent => overdue_count += 1,
            PriorityLevel::High => due_today_count += 1,
            _ => {}
        }
        buckets.insert(level);
    }

    let health = health_signals(plant);

    let priority_level = buckets
        .iter()
        .copied()
        .chain(health.iter().map(|(level, _)| *level))
        .max()
        .unwrap_or_default();

    let mut reasons: Vec<AttentionReason> = PriorityLevel::DESCENDING
        .iter()
        .filter(|level| buckets.contains(*level))
        .filter_map(|level| AttentionReason::for_reminder_bucket(*level))
        .collect();
    reasons.extend(health.into_iter().map(|(_, reason)| reason));

    PlantAttentionStatus {
        plant_id: plant.id,
        needs_attention: priority_level != PriorityLevel::Low,
        priority_level,
        reminder_count,
        overdue_count,
        due_today_count,
        reasons,
    }
}

/// Attention status for one plant. Reminders of other plants are ignored.
pub fn aggregate<Tz: TimeZone>(
    plant: &Plant,
    reminders: &[Reminder],
    now: DateTime<Utc>,
    tz: &Tz,
) -> PlantAttentionStatus {
    aggregate_with(plant, reminders, &DayBoundaries::around(now, tz))
}

/// Attention for every plant in `plants`, in input order.
///
/// Active reminders whose plant is not in `plants` are left out of every
/// status and listed in [`AttentionReport::orphaned_reminders`].
pub fn aggregate_all<Tz: TimeZone>(
    plants: &[Plant],
    reminders: &[Reminder],
    now: DateTime<Utc>,
    tz: &Tz,
) -> AttentionReport {
    let boundaries = DayBoundaries::around(now, tz);

    let mut by_plant: HashMap<Uuid, Vec<&Reminder>> = HashMap::new();
    for reminder in reminders.iter().filter(|r| r.is_active()) {
        by_plant.entry(reminder.plant_id).or_default().push(reminder);
    }

    let statuses = plants
        .iter()
        .map(|plant| {
            let own = by_plant.remove(&plant.id).unwrap_or_default();
            aggregate_with(plant, own, &boundaries)
        })
        .collect();

    let mut orphaned_reminders: Vec<Uuid> = Vec::new();
    for (plant_id, orphans) in by_plant {
        for reminder in orphans {
            tracing::warn!(
                reminder_id = %reminder.id,
                plant_id = %plant_id,
                "Reminder references an unknown plant; excluded from attention"
            );
            orphaned_reminders.push(reminder.id);
        }
    }
    orphaned_reminders.sort();

    AttentionReport {
        statuses,
        orphaned_reminders,
    }
}
