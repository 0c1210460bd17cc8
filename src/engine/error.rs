use ulid::Ulid;

use crate::model::{Ms, TimeWindow};
use crate::store::StoreError;

/// Where a booking conflict was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSource {
    /// An overlapping reservation in our own store.
    Internal,
    /// A busy interval reported by the external calendar.
    External,
    /// The external calendar could not be checked and policy is fail-closed.
    Unverifiable,
}

impl ConflictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSource::Internal => "internal",
            ConflictSource::External => "external",
            ConflictSource::Unverifiable => "unverifiable",
        }
    }
}

/// Pre-commit failures carry enough structure for the caller to render an
/// actionable message. Everything here is raised before the reservation
/// insert; failures after the commit point degrade to warnings instead.
#[derive(Debug)]
pub enum BookingError {
    /// Bad input shape — unknown plan, duration mismatch, window out of
    /// range. No side effects.
    Validation { reason: String },
    /// The plan's mandatory spacing has not elapsed; retry after `until`.
    Cooldown { student_id: Ulid, until: Ms },
    InsufficientCredit { student_id: Ulid },
    Conflict {
        instructor_id: Ulid,
        window: TimeWindow,
        source: ConflictSource,
    },
    Store(StoreError),
}

impl BookingError {
    pub(super) fn metric_label(&self) -> &'static str {
        match self {
            BookingError::Validation { .. } => "validation",
            BookingError::Cooldown { .. } => "cooldown",
            BookingError::InsufficientCredit { .. } => "insufficient_credit",
            BookingError::Conflict { source, .. } => source.as_str(),
            BookingError::Store(_) => "store",
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation { reason } => write!(f, "invalid booking: {reason}"),
            BookingError::Cooldown { student_id, until } => write!(
                f,
                "student {student_id} is in cooldown until {until}"
            ),
            BookingError::InsufficientCredit { student_id } => {
                write!(f, "student {student_id} has no remaining credit")
            }
            BookingError::Conflict {
                instructor_id,
                window,
                source,
            } => write!(
                f,
                "instructor {instructor_id} is not free in [{}, {}) ({} conflict)",
                window.start,
                window.end,
                source.as_str()
            ),
            BookingError::Store(e) => write!(f, "reservation store: {e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        BookingError::Store(e)
    }
}
