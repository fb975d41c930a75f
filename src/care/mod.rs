//! Care domain: reminders, plants and the derived attention signal.
//!
//! Everything in here is synchronous and side-effect free. The async world
//! (storage, notifications) lives in [`crate::store`], [`crate::notifications`]
//! and [`crate::reminders`].

pub mod attention;
pub mod grouping;
pub mod priority;
pub mod schedule;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use attention::{aggregate, aggregate_all, AttentionReason, AttentionReport, PlantAttentionStatus};
pub use grouping::{group, GroupedReminders, PrioritizedReminder};
pub use priority::{classify, PriorityLevel};
pub use schedule::{validate, ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Watering,
    Nutrients,
    Inspection,
    Other,
}

impl ReminderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::Watering => "watering",
            ReminderType::Nutrients => "nutrients",
            ReminderType::Inspection => "inspection",
            ReminderType::Other => "other",
        }
    }
}

impl fmt::Display for ReminderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "watering" => Ok(ReminderType::Watering),
            "nutrients" => Ok(ReminderType::Nutrients),
            "inspection" => Ok(ReminderType::Inspection),
            "other" => Ok(ReminderType::Other),
            unknown => Err(format!("unknown reminder type '{}'", unknown)),
        }
    }
}

/// A scheduled care task owned by exactly one plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub plant_id: Uuid,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Authoritative due instant.
    pub scheduled_for: DateTime<Utc>,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(plant_id: Uuid, reminder_type: ReminderType, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plant_id,
            reminder_type,
            title: None,
            description: None,
            scheduled_for,
            is_completed: false,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    /// Part of the working set: not deleted and not yet completed.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && !self.is_completed
    }

    pub fn state(&self) -> ReminderState {
        if self.is_deleted {
            ReminderState::Deleted
        } else if self.is_completed {
            ReminderState::Completed
        } else {
            ReminderState::Scheduled
        }
    }
}

/// Lifecycle state. `Completed` and `Deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    Scheduled,
    Completed,
    Deleted,
}

impl fmt::Display for ReminderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderState::Scheduled => f.write_str("scheduled"),
            ReminderState::Completed => f.write_str("completed"),
            ReminderState::Deleted => f.write_str("deleted"),
        }
    }
}

/// Read-only view of a plant as provided by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: Uuid,
    pub name: String,
    pub strain: Option<String>,
    pub image_url: Option<String>,
    /// 0..=100
    pub health_percentage: i32,
    pub next_watering_days: i32,
    pub next_nutrient_days: i32,
}

/// Source of "now". Swapped for a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Timezones the service can run its calendar in.
pub trait DeviceZone: TimeZone + Send + Sync + 'static {}

impl<T: TimeZone + Send + Sync + 'static> DeviceZone for T {}

/// The device's local calendar: a timezone plus a clock.
#[derive(Clone)]
pub struct Calendar<Tz: TimeZone> {
    tz: Tz,
    clock: Arc<dyn Clock>,
}

impl<Tz: TimeZone> Calendar<Tz> {
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { tz, clock }
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Calendar<chrono::Local> {
    pub fn local() -> Self {
        Self::new(chrono::Local, Arc::new(SystemClock))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Clock pinned to an instant, movable by tests.
    pub struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self(Mutex::new(now))
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    pub fn plant(name: &str) -> Plant {
        Plant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            strain: None,
            image_url: None,
            health_percentage: 100,
            next_watering_days: 5,
            next_nutrient_days: 5,
        }
    }

    pub fn reminder_for(plant: &Plant, scheduled_for: DateTime<Utc>) -> Reminder {
        Reminder::new(plant.id, ReminderType::Watering, scheduled_for)
    }
}
