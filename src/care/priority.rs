use std::fmt;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::resolve_local;
use super::Reminder;

/// Calendar days after today that still count as "due soon".
pub const SOON_WINDOW_DAYS: u64 = 2;

/// Severity bucket. Ordered `Low < Medium < High < Urgent`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    #[default]
    Low,
    Medium,
    High,
    Urgent,
}

impl PriorityLevel {
    /// Most severe first.
    pub const DESCENDING: [PriorityLevel; 4] = [
        PriorityLevel::Urgent,
        PriorityLevel::High,
        PriorityLevel::Medium,
        PriorityLevel::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Urgent => "urgent",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local-midnight boundaries around "now", expressed as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundaries {
    pub start_of_today: DateTime<Utc>,
    pub start_of_tomorrow: DateTime<Utc>,
    pub end_of_soon_window: DateTime<Utc>,
}

impl DayBoundaries {
    pub fn around<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Self {
        let today = now.with_timezone(tz).date_naive();
        Self {
            start_of_today: local_midnight(today, 0, tz),
            start_of_tomorrow: local_midnight(today, 1, tz),
            end_of_soon_window: local_midnight(today, 1 + SOON_WINDOW_DAYS, tz),
        }
    }

    /// Boundary instants fall into the later bucket.
    pub fn classify(&self, due: DateTime<Utc>) -> PriorityLevel {
        if due < self.start_of_today {
            PriorityLevel::Urgent
        } else if due < self.start_of_tomorrow {
            PriorityLevel::High
        } else if due < self.end_of_soon_window {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }
}

fn local_midnight<Tz: TimeZone>(day: NaiveDate, offset_days: u64, tz: &Tz) -> DateTime<Utc> {
    let day = day.checked_add_days(Days::new(offset_days)).unwrap_or(NaiveDate::MAX);
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    resolve_local(tz, midnight)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Buckets a reminder by its due instant alone; the reminder type plays no part.
pub fn classify<Tz: TimeZone>(reminder: &Reminder, now: DateTime<Utc>, tz: &Tz) -> PriorityLevel {
    DayBoundaries::around(now, tz).classify(reminder.scheduled_for)
}
