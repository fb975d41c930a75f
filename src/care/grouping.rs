use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::priority::{DayBoundaries, PriorityLevel};
use super::Reminder;

/// A reminder together with its freshly derived bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedReminder {
    #[serde(flatten)]
    pub reminder: Reminder,
    pub priority_level: PriorityLevel,
}

/// Reminders partitioned by bucket. Empty buckets are empty vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedReminders {
    pub urgent: Vec<PrioritizedReminder>,
    pub high: Vec<PrioritizedReminder>,
    pub medium: Vec<PrioritizedReminder>,
    pub low: Vec<PrioritizedReminder>,
}

impl GroupedReminders {
    pub fn bucket(&self, level: PriorityLevel) -> &[PrioritizedReminder] {
        match level {
            PriorityLevel::Urgent => &self.urgent,
            PriorityLevel::High => &self.high,
            PriorityLevel::Medium => &self.medium,
            PriorityLevel::Low => &self.low,
        }
    }

    fn bucket_mut(&mut self, level: PriorityLevel) -> &mut Vec<PrioritizedReminder> {
        match level {
            PriorityLevel::Urgent => &mut self.urgent,
            PriorityLevel::High => &mut self.high,
            PriorityLevel::Medium => &mut self.medium,
            PriorityLevel::Low => &mut self.low,
        }
    }

    pub fn len(&self) -> usize {
        self.urgent.len() + self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All reminders, most severe bucket first, input order within a bucket.
    pub fn iter(&self) -> impl Iterator<Item = &PrioritizedReminder> {
        PriorityLevel::DESCENDING
            .into_iter()
            .flat_map(move |level| self.bucket(level).iter())
    }
}

/// Partitions `reminders` by bucket without re-sorting.
///
/// Callers sort by `scheduled_for` beforehand if they want chronological
/// buckets.
pub fn group<Tz: TimeZone>(reminders: &[Reminder], now: DateTime<Utc>, tz: &Tz) -> GroupedReminders {
    let boundaries = DayBoundaries::around(now, tz);
    let mut grouped = GroupedReminders::default();
    for reminder in reminders {
        let priority_level = boundaries.classify(reminder.scheduled_for);
        grouped.bucket_mut(priority_level).push(PrioritizedReminder {
            reminder: reminder.clone(),
            priority_level,
        });
    }
    grouped
}
