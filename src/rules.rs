use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{DAY_MS, HOUR_MS, MINUTE_MS, Ms, TimeWindow};

/// An instructor's bookability configuration. Owned and mutated through the
/// instructor's profile; the engine only reads it.
///
/// Times-of-day are interpreted as wall-clock in the instructor's UTC offset,
/// so notice-window math near midnight stays correct regardless of where the
/// process runs. Offset changes (DST) are the profile owner's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRuleSet {
    pub working_days: Vec<Weekday>,
    pub daily_open: NaiveTime,
    pub daily_close: NaiveTime,
    /// Both bounds or neither.
    pub break_window: Option<(NaiveTime, NaiveTime)>,
    /// Spacing between candidate starts.
    pub slot_granularity_minutes: u32,
    /// Length of the offering being booked; may differ per plan.
    pub session_duration_minutes: u32,
    pub min_notice_hours: i64,
    pub utc_offset_minutes: i32,
}

impl AvailabilityRuleSet {
    /// Degenerate windows (zero-length day, break spanning the day) are legal
    /// and generate empty availability; zero granularity or duration is not.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.slot_granularity_minutes == 0 {
            return Err("slot granularity must be positive");
        }
        if self.session_duration_minutes == 0 {
            return Err("session duration must be positive");
        }
        if self.min_notice_hours < 0 {
            return Err("minimum notice must be non-negative");
        }
        Ok(())
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday())
    }

    /// Wall-clock `date` + `time` in the instructor's offset, as a UTC instant.
    fn local_instant(&self, date: NaiveDate, time: NaiveTime) -> Ms {
        date.and_time(time).and_utc().timestamp_millis() - (self.utc_offset_minutes as Ms) * MINUTE_MS
    }

    /// `[daily_open, daily_close)` for the date, or `None` when the working
    /// day is empty.
    pub fn day_window(&self, date: NaiveDate) -> Option<TimeWindow> {
        let start = self.local_instant(date, self.daily_open);
        let end = self.local_instant(date, self.daily_close);
        (start < end).then(|| TimeWindow::new(start, end))
    }

    pub fn break_window_for(&self, date: NaiveDate) -> Option<TimeWindow> {
        self.break_window.and_then(|(open, close)| {
            let start = self.local_instant(date, open);
            let end = self.local_instant(date, close);
            (start < end).then(|| TimeWindow::new(start, end))
        })
    }

    /// The full civil day `[00:00, 24:00)` in the instructor's offset.
    pub fn civil_day(&self, date: NaiveDate) -> TimeWindow {
        let start = self.local_instant(date, NaiveTime::MIN);
        TimeWindow::new(start, start + DAY_MS)
    }

    /// Earliest bookable instant: candidates starting before this are too soon.
    pub fn notice_limit(&self, now: Ms) -> Ms {
        now + self.min_notice_hours * HOUR_MS
    }

    pub fn granularity_ms(&self) -> Ms {
        self.slot_granularity_minutes as Ms * MINUTE_MS
    }

    pub fn session_duration_ms(&self) -> Ms {
        self.session_duration_minutes as Ms * MINUTE_MS
    }
}

/// Read-only view of an instructor handed to the engine by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorProfile {
    pub id: Ulid,
    pub rules: AvailabilityRuleSet,
    /// External calendar account, when the instructor has one linked.
    pub calendar_account: Option<String>,
}
