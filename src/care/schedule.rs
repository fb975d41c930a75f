//! Turns a due instant (plus an optional whole-day shift) into a trigger
//! instant that is safe to hand to the notification scheduler.

use chrono::{DateTime, Days, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

/// Default minimum distance between "now" and a trigger.
pub const DEFAULT_MIN_LEAD_MINUTES: i64 = 1;

/// Largest whole-day shift accepted in one step (about ten years).
pub const MAX_SHIFT_DAYS: u32 = 3650;

/// Longest wall-clock gap we walk across when a local time does not exist.
const DST_GAP_STEP_MINUTES: i64 = 15;
const DST_GAP_MAX_STEPS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationError {
    #[error("the requested date is in the past")]
    PastDate,
    #[error("the requested date is too close to now")]
    TooSoon,
    #[error("the requested date is out of range")]
    OutOfRange,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::PastDate => "PAST_DATE",
            ValidationError::TooSoon => "TOO_SOON",
            ValidationError::OutOfRange => "OUT_OF_RANGE",
        }
    }
}

pub type ValidationResult = Result<DateTime<Utc>, ValidationError>;

/// Validates `candidate + days_offset` (calendar days in `tz`) against `now`.
///
/// The shift keeps the local wall-clock time, so one day across a DST change
/// is 23 or 25 hours of absolute time. Shifts above [`MAX_SHIFT_DAYS`] and
/// targets chrono cannot represent are `OutOfRange`. Never panics.
pub fn validate<Tz: TimeZone>(
    candidate: DateTime<Utc>,
    days_offset: u32,
    minimum_lead_minutes: i64,
    now: DateTime<Utc>,
    tz: &Tz,
) -> ValidationResult {
    if days_offset > MAX_SHIFT_DAYS {
        return Err(ValidationError::OutOfRange);
    }
    let target =
        add_calendar_days(candidate, days_offset, tz).ok_or(ValidationError::OutOfRange)?;

    if target < now {
        return Err(ValidationError::PastDate);
    }

    let earliest = Duration::try_minutes(minimum_lead_minutes.max(0))
        .and_then(|lead| now.checked_add_signed(lead));
    match earliest {
        Some(earliest) if target >= earliest => {}
        _ => return Err(ValidationError::TooSoon),
    }

    Ok(target)
}

/// Adds whole calendar days in the local zone, keeping the wall-clock time.
pub fn add_calendar_days<Tz: TimeZone>(
    instant: DateTime<Utc>,
    days: u32,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    if days == 0 {
        return Some(instant);
    }
    let local = instant.with_timezone(tz).naive_local();
    let shifted = local.checked_add_days(Days::new(u64::from(days)))?;
    resolve_local(tz, shifted).map(|dt| dt.with_timezone(&Utc))
}

/// Maps a wall-clock time to an instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times inside
/// a gap (clocks going forward) roll forward to the first wall-clock time that
/// exists.
pub(crate) fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Some(dt);
    }
    (1..=DST_GAP_MAX_STEPS).find_map(|step| {
        let probe = naive.checked_add_signed(Duration::minutes(DST_GAP_STEP_MINUTES * step))?;
        tz.from_local_datetime(&probe).earliest()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn zero_offset_at_now_is_too_soon() {
        let now = utc(2026, 6, 1, 12, 0);
        assert_eq!(validate(now, 0, 1, now, &Utc), Err(ValidationError::TooSoon));
    }

    #[test]
    fn one_day_offset_from_now_succeeds() {
        let now = utc(2026, 6, 1, 12, 0);
        assert_eq!(validate(now, 1, 1, now, &Utc), Ok(utc(2026, 6, 2, 12, 0)));
    }

    #[test]
    fn target_before_now_is_past_date() {
        let now = utc(2026, 6, 10, 12, 0);
        let due = utc(2026, 6, 1, 12, 0);
        assert_eq!(validate(due, 2, 1, now, &Utc), Err(ValidationError::PastDate));
    }

    #[test]
    fn lead_time_is_respected() {
        let now = utc(2026, 6, 1, 12, 0);
        let due = utc(2026, 6, 1, 12, 30);
        assert_eq!(validate(due, 0, 45, now, &Utc), Err(ValidationError::TooSoon));
        assert_eq!(validate(due, 0, 30, now, &Utc), Ok(due));
    }

    #[test]
    fn one_day_across_spring_forward_is_23_hours() {
        // 2026-03-07 10:00 EST
        let now = utc(2026, 3, 7, 15, 0);
        let target = validate(now, 1, 1, now, &New_York).unwrap();
        // 2026-03-08 10:00 EDT
        assert_eq!(target, utc(2026, 3, 8, 14, 0));
        assert_eq!(target - now, Duration::hours(23));
        assert_eq!(
            target.with_timezone(&New_York).naive_local().time(),
            now.with_timezone(&New_York).naive_local().time()
        );
    }

    #[test]
    fn one_day_across_fall_back_is_25_hours() {
        // 2026-10-31 10:00 EDT
        let now = utc(2026, 10, 31, 14, 0);
        let target = validate(now, 1, 1, now, &New_York).unwrap();
        // 2026-11-01 10:00 EST
        assert_eq!(target, utc(2026, 11, 1, 15, 0));
        assert_eq!(target - now, Duration::hours(25));
    }

    #[test]
    fn nonexistent_local_time_rolls_forward() {
        // 2026-03-07 02:30 EST; the next day's 02:30 does not exist.
        let due = utc(2026, 3, 7, 7, 30);
        let now = due - Duration::hours(1);
        let target = validate(due, 1, 1, now, &New_York).unwrap();
        // 03:00 EDT
        assert_eq!(target, utc(2026, 3, 8, 7, 0));
    }

    #[test]
    fn oversized_shift_is_out_of_range() {
        let now = utc(2026, 6, 1, 12, 0);
        assert_eq!(
            validate(now, u32::MAX, 1, now, &Utc),
            Err(ValidationError::OutOfRange)
        );
        assert_eq!(
            validate(now, MAX_SHIFT_DAYS + 1, 1, now, &Utc),
            Err(ValidationError::OutOfRange)
        );
        assert!(validate(now, MAX_SHIFT_DAYS, 1, now, &Utc).is_ok());
    }

    #[test]
    fn shift_past_the_representable_range_is_out_of_range() {
        let now = utc(2026, 6, 1, 12, 0);
        let edge = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        assert_eq!(validate(edge, 1, 1, now, &Utc), Err(ValidationError::OutOfRange));
    }

    #[test]
    fn unrepresentable_lead_is_too_soon() {
        let now = utc(2026, 6, 1, 12, 0);
        assert_eq!(
            validate(now, 1, i64::MAX, now, &Utc),
            Err(ValidationError::TooSoon)
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ValidationError::OutOfRange.code(), "OUT_OF_RANGE");
        assert_eq!(ValidationError::PastDate.code(), "PAST_DATE");
        assert_eq!(
            serde_json::to_value(ValidationError::TooSoon).unwrap(),
            serde_json::json!("TOO_SOON")
        );
    }
}
