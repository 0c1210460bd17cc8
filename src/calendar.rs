use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::TimeWindow;

/// Why the external calendar could not answer. Callers decide whether this
/// blocks a booking (fail-closed) or degrades it (fail-open) — the provider
/// only reports, it never hides the distinction behind an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    Unavailable(String),
    Unauthorized,
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarError::Unavailable(e) => write!(f, "external calendar unavailable: {e}"),
            CalendarError::Unauthorized => write!(f, "external calendar rejected credentials"),
        }
    }
}

impl std::error::Error for CalendarError {}

/// Event details pushed to the external calendar after a reservation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventDraft {
    pub summary: String,
    pub window: TimeWindow,
    pub reservation_id: Ulid,
}

/// External calendar collaborator. Busy intervals are a veto signal read at
/// booking time, never persisted as a conflict source of truth.
#[async_trait]
pub trait ExternalCalendarProvider: Send + Sync {
    /// Busy intervals intersecting `window` for the given account.
    async fn busy_intervals(
        &self,
        account: &str,
        window: TimeWindow,
    ) -> Result<Vec<TimeWindow>, CalendarError>;

    /// Create an event; returns the provider's event id.
    async fn create_event(
        &self,
        account: &str,
        draft: &CalendarEventDraft,
    ) -> Result<String, CalendarError>;
}
