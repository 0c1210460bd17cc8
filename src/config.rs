use std::time::Duration;

use crate::model::BookingChannel;

/// What to do when the external calendar cannot be verified at booking time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnverifiedPolicy {
    /// Proceed on internal data alone.
    FailOpen,
    /// Reject the booking until the calendar can be checked.
    FailClosed,
}

/// Engine configuration, injected at construction. The core never reads
/// process environment; embedders resolve their env/files into this struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Student-initiated bookings: strict by default.
    pub student_booking_policy: UnverifiedPolicy,
    /// Admin-created sessions: the office can see the instructor's paper
    /// diary, so an unreachable calendar does not block them.
    pub admin_booking_policy: UnverifiedPolicy,
    /// Bound on every external-calendar call, pre- and post-commit.
    pub calendar_timeout: Duration,
    /// Lesson reminders are scheduled this long before the slot starts.
    pub reminder_lead_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            student_booking_policy: UnverifiedPolicy::FailClosed,
            admin_booking_policy: UnverifiedPolicy::FailOpen,
            calendar_timeout: Duration::from_secs(3),
            reminder_lead_hours: 24,
        }
    }
}

impl EngineConfig {
    pub fn policy_for(&self, channel: BookingChannel) -> UnverifiedPolicy {
        match channel {
            BookingChannel::Student => self.student_booking_policy,
            BookingChannel::Admin => self.admin_booking_policy,
        }
    }
}
