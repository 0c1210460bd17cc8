use ulid::Ulid;

use crate::limits::*;
use crate::model::{Ms, ReservationStatus, TimeWindow};
use crate::rules::InstructorProfile;
use crate::store::StoreError;

use super::error::BookingError;
use super::Engine;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_window(window: &TimeWindow) -> Result<(), BookingError> {
    if window.start >= window.end {
        return Err(BookingError::Validation {
            reason: "window start must precede its end".into(),
        });
    }
    if window.start < MIN_VALID_TIMESTAMP_MS || window.end > MAX_VALID_TIMESTAMP_MS {
        return Err(BookingError::Validation {
            reason: "timestamp out of range".into(),
        });
    }
    if window.duration_ms() > MAX_SESSION_DURATION_MS {
        return Err(BookingError::Validation {
            reason: "session too long".into(),
        });
    }
    Ok(())
}

/// Outcome of the external-calendar leg of a conflict probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalProbe {
    /// Checked; no busy interval intersects the window.
    Clear,
    /// Checked; at least one busy interval intersects the window.
    Busy,
    /// The provider could not answer. Distinct from `Clear` by contract:
    /// the caller's policy decides whether this blocks the booking.
    Unverified(String),
    /// The instructor has no calendar linked — nothing to verify.
    Skipped,
}

/// Merged result of the internal and external checks. The internal leg is
/// always authoritative and always completes; the external leg may degrade
/// to `Unverified` without taking the internal answer with it.
#[derive(Debug)]
pub struct ConflictProbe {
    /// First overlapping non-cancelled reservation, when one exists.
    pub internal: Option<Ulid>,
    pub external: ExternalProbe,
}

impl ConflictProbe {
    pub fn is_clear(&self) -> bool {
        self.internal.is_none()
            && matches!(self.external, ExternalProbe::Clear | ExternalProbe::Skipped)
    }
}

impl Engine {
    /// Check a proposed window against both conflict sources. The legs run
    /// concurrently; the external one is bounded by the configured timeout.
    pub async fn probe_conflict(
        &self,
        instructor: &InstructorProfile,
        window: TimeWindow,
    ) -> Result<ConflictProbe, BookingError> {
        let internal = async {
            let overlapping = self
                .reservations
                .list_overlapping(instructor.id, window, &[ReservationStatus::Cancelled])
                .await?;
            Ok::<_, StoreError>(overlapping.first().map(|r| r.id))
        };
        let external = self.probe_external(instructor, window);

        let (internal, external) = futures::join!(internal, external);
        Ok(ConflictProbe {
            internal: internal?,
            external,
        })
    }

    async fn probe_external(
        &self,
        instructor: &InstructorProfile,
        window: TimeWindow,
    ) -> ExternalProbe {
        let Some(account) = instructor.calendar_account.as_deref() else {
            return ExternalProbe::Skipped;
        };
        let call = self.calendar.busy_intervals(account, window);
        match tokio::time::timeout(self.config.calendar_timeout, call).await {
            Ok(Ok(busy)) => {
                if busy.iter().any(|b| b.overlaps(&window)) {
                    ExternalProbe::Busy
                } else {
                    ExternalProbe::Clear
                }
            }
            Ok(Err(e)) => {
                metrics::counter!(crate::observability::EXTERNAL_CHECK_UNVERIFIED_TOTAL)
                    .increment(1);
                tracing::warn!(instructor = %instructor.id, "external calendar check failed: {e}");
                ExternalProbe::Unverified(e.to_string())
            }
            Err(_) => {
                metrics::counter!(crate::observability::EXTERNAL_CHECK_UNVERIFIED_TOTAL)
                    .increment(1);
                tracing::warn!(instructor = %instructor.id, "external calendar check timed out");
                ExternalProbe::Unverified("external calendar timed out".into())
            }
        }
    }
}
