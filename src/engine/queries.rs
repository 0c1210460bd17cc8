use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Ms, Reservation, ReservationStatus};
use crate::rules::InstructorProfile;

use super::conflict::now_ms;
use super::error::BookingError;
use super::slots::generate_slots;
use super::Engine;

impl Engine {
    /// Offerable start times for one instructor and date. This is the
    /// read-side listing callers render a picker from; the booking
    /// transaction re-validates at commit time regardless.
    pub async fn offerable_starts(
        &self,
        instructor: &InstructorProfile,
        date: NaiveDate,
    ) -> Result<Vec<Ms>, BookingError> {
        instructor
            .rules
            .validate()
            .map_err(|reason| BookingError::Validation {
                reason: reason.into(),
            })?;
        let Some(day) = instructor.rules.day_window(date) else {
            return Ok(Vec::new());
        };
        let existing: Vec<_> = self
            .reservations
            .list_overlapping(instructor.id, day, &[ReservationStatus::Cancelled])
            .await?
            .into_iter()
            .map(|r| r.window)
            .collect();

        let starts = generate_slots(&instructor.rules, date, &existing, now_ms());
        metrics::counter!(crate::observability::SLOTS_OFFERED_TOTAL)
            .increment(starts.len() as u64);
        Ok(starts)
    }

    /// All non-cancelled reservations touching the instructor's civil day.
    pub async fn reservations_for_day(
        &self,
        instructor: &InstructorProfile,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, BookingError> {
        let day = instructor.rules.civil_day(date);
        Ok(self
            .reservations
            .list_overlapping(instructor.id, day, &[ReservationStatus::Cancelled])
            .await?)
    }

    /// Full history for an instructor, cancelled included.
    pub async fn list_reservations(
        &self,
        instructor_id: Ulid,
    ) -> Result<Vec<Reservation>, BookingError> {
        Ok(self.reservations.list_for_instructor(instructor_id).await?)
    }
}
