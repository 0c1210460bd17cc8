use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type in the core.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Ms,
    pub end: Ms,
}

impl TimeWindow {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "TimeWindow start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Strict overlap: equal boundaries do NOT conflict, so a lesson ending
    /// at `T` and one starting at `T` can be booked back-to-back.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Scheduled => "scheduled",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }
}

/// Who initiated a booking. Selects the unverifiable-calendar policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingChannel {
    Student,
    Admin,
}

/// An internal booking record. Created once by the booking transaction;
/// status transitions are the only mutation path afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub instructor_id: Ulid,
    pub student_id: Ulid,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    pub channel: BookingChannel,
    pub plan_key: String,
    pub created_at: Ms,
}

impl Reservation {
    /// Cancelled reservations stop counting toward conflicts.
    pub fn blocks(&self) -> bool {
        !matches!(self.status, ReservationStatus::Cancelled)
    }
}

/// Secondary best-effort marker recorded after a reservation commits.
/// Not required for correctness — the reservation itself is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLock {
    pub instructor_id: Ulid,
    pub window: TimeWindow,
    pub reservation_id: Ulid,
    pub recorded_at: Ms,
}

/// A student's prepaid entitlement. Hour balances are carried as whole
/// minutes so conditional arithmetic stays integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub sessions_remaining: i64,
    pub minutes_remaining: i64,
    pub cooldown_until: Option<Ms>,
}

impl CreditBalance {
    pub fn new(sessions: i64, minutes: i64) -> Self {
        Self {
            sessions_remaining: sessions,
            minutes_remaining: minutes,
            cooldown_until: None,
        }
    }
}

/// Plan definition resolved from a booking's plan key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub key: String,
    /// Some plans only come in one size (e.g. the mandatory 2-hour highway
    /// session); a mismatched window is rejected before any store is touched.
    pub fixed_duration_minutes: Option<u32>,
    /// Mandatory spacing after a session of this plan before the next one.
    pub cooldown_hours: Option<i64>,
    pub sessions_cost: i64,
    pub minutes_cost: i64,
}

/// Soft, non-fatal degradations attached to a successful booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingWarning {
    /// The external calendar push failed; the reservation stands.
    ExternalSyncFailed(String),
    /// The secondary slot-lock marker could not be recorded.
    SlotLockFailed(String),
    /// Credit deduction failed after the reservation committed. The booking
    /// is kept and the inconsistency is surfaced for reconciliation.
    CreditUnsettled(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub reservation_id: Ulid,
    pub instructor_id: Ulid,
    pub student_id: Ulid,
    pub window: TimeWindow,
    pub external_event_id: Option<String>,
    pub warnings: Vec<BookingWarning>,
}
