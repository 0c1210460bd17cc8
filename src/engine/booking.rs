use std::time::Instant;

use ulid::Ulid;

use crate::config::UnverifiedPolicy;
use crate::limits::*;
use crate::model::*;
use crate::notify::{NotificationIntent, TemplateKind};
use crate::rules::InstructorProfile;
use crate::store::StoreError;

use super::conflict::{now_ms, validate_window, ExternalProbe};
use super::error::{BookingError, ConflictSource};
use super::Engine;

impl Engine {
    /// Reserve a slot and consume credit for it.
    ///
    /// Linear state machine, no backward transitions: validate → cooldown →
    /// credit → conflict → reserve → deduct → cooldown-set → external sync →
    /// slot lock. The reservation insert is the commit point; everything
    /// after it degrades to warnings on the receipt instead of unwinding.
    pub async fn book(
        &self,
        student_id: Ulid,
        instructor: &InstructorProfile,
        window: TimeWindow,
        plan_key: &str,
        channel: BookingChannel,
    ) -> Result<BookingReceipt, BookingError> {
        let started = Instant::now();
        let result = self
            .book_inner(student_id, instructor, window, plan_key, channel)
            .await;
        let outcome = match &result {
            Ok(_) => "committed",
            Err(e) => e.metric_label(),
        };
        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "outcome" => outcome)
            .increment(1);
        metrics::histogram!(crate::observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        if let Err(BookingError::Conflict { source, .. }) = &result {
            metrics::counter!(crate::observability::CONFLICTS_TOTAL, "source" => source.as_str())
                .increment(1);
        }
        result
    }

    async fn book_inner(
        &self,
        student_id: Ulid,
        instructor: &InstructorProfile,
        window: TimeWindow,
        plan_key: &str,
        channel: BookingChannel,
    ) -> Result<BookingReceipt, BookingError> {
        // 1. Plan-specific validation. Nothing below runs on bad input.
        validate_window(&window)?;
        if plan_key.len() > MAX_PLAN_KEY_LEN {
            return Err(BookingError::Validation {
                reason: "plan key too long".into(),
            });
        }
        let plan = self.plans.get(plan_key).ok_or_else(|| BookingError::Validation {
            reason: format!("unknown plan: {plan_key}"),
        })?;
        if let Some(required) = plan.fixed_duration_minutes {
            let required_ms = required as Ms * MINUTE_MS;
            if window.duration_ms() != required_ms {
                return Err(BookingError::Validation {
                    reason: format!("plan {plan_key} requires exactly {required}-minute sessions"),
                });
            }
        }
        let now = now_ms();

        // 2. Cooldown gate, for plans that carry one.
        if plan.cooldown_hours.is_some()
            && let Some(until) = self.credits.cooldown_until(student_id).await?
            && until > now
        {
            return Err(BookingError::Cooldown { student_id, until });
        }

        // 3. Credit precheck. Advisory — the race-safe conditional decrement
        // runs after the reserve; this only rejects the obviously broke.
        if !self
            .credits
            .has_credit(student_id, plan.sessions_cost, plan.minutes_cost)
            .await?
        {
            return Err(BookingError::InsufficientCredit { student_id });
        }

        // 4. Conflict check against both sources.
        let probe = self.probe_conflict(instructor, window).await?;
        match probe.external {
            ExternalProbe::Busy => {
                return Err(BookingError::Conflict {
                    instructor_id: instructor.id,
                    window,
                    source: ConflictSource::External,
                });
            }
            ExternalProbe::Unverified(ref reason) => {
                if self.config.policy_for(channel) == UnverifiedPolicy::FailClosed {
                    return Err(BookingError::Conflict {
                        instructor_id: instructor.id,
                        window,
                        source: ConflictSource::Unverifiable,
                    });
                }
                tracing::warn!(
                    instructor = %instructor.id,
                    "booking proceeds on internal data only: {reason}"
                );
            }
            ExternalProbe::Clear | ExternalProbe::Skipped => {}
        }
        if probe.internal.is_some() {
            return Err(BookingError::Conflict {
                instructor_id: instructor.id,
                window,
                source: ConflictSource::Internal,
            });
        }

        // 5. Reserve — the commit point. The store re-validates overlap
        // inside its own critical section, so a concurrent booking that won
        // the race surfaces here as an internal conflict, not a double book.
        let reservation = Reservation {
            id: Ulid::new(),
            instructor_id: instructor.id,
            student_id,
            window,
            status: ReservationStatus::Scheduled,
            channel,
            plan_key: plan_key.to_string(),
            created_at: now,
        };
        let reservation_id = match self.reservations.insert(reservation).await {
            Ok(id) => id,
            Err(StoreError::Overlap { .. }) => {
                return Err(BookingError::Conflict {
                    instructor_id: instructor.id,
                    window,
                    source: ConflictSource::Internal,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut warnings = Vec::new();

        // 6. Conditional credit deduction. A refusal here means a concurrent
        // booking consumed the last credit between steps 3 and 5. Fail
        // forward: the reservation stands, the inconsistency goes to the
        // reconciliation log target and counter.
        match self
            .credits
            .decrement_if_positive(student_id, plan.sessions_cost, plan.minutes_cost)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                metrics::counter!(crate::observability::CREDIT_RECONCILIATIONS_TOTAL)
                    .increment(1);
                tracing::error!(
                    target: "drivetime::reconcile",
                    %reservation_id,
                    %student_id,
                    "credit deduction refused after reservation commit; booking kept"
                );
                warnings.push(BookingWarning::CreditUnsettled(
                    "credit balance was not deducted; flagged for reconciliation".into(),
                ));
            }
            Err(e) => {
                metrics::counter!(crate::observability::CREDIT_RECONCILIATIONS_TOTAL)
                    .increment(1);
                tracing::error!(
                    target: "drivetime::reconcile",
                    %reservation_id,
                    %student_id,
                    "credit store failed after reservation commit: {e}"
                );
                warnings.push(BookingWarning::CreditUnsettled(e.to_string()));
            }
        }

        // 7. Mandatory spacing after this category of session.
        if let Some(hours) = plan.cooldown_hours {
            let until = window.end + hours * HOUR_MS;
            if let Err(e) = self.credits.set_cooldown(student_id, until).await {
                tracing::warn!(%student_id, "failed to set cooldown: {e}");
            }
        }

        // 8. External calendar push. Non-fatal: the internal reservation is
        // already authoritative.
        let mut external_event_id = None;
        if let Some(account) = instructor.calendar_account.as_deref() {
            let draft = crate::calendar::CalendarEventDraft {
                summary: format!("Driving lesson ({plan_key})"),
                window,
                reservation_id,
            };
            let push = self.calendar.create_event(account, &draft);
            match tokio::time::timeout(self.config.calendar_timeout, push).await {
                Ok(Ok(event_id)) => external_event_id = Some(event_id),
                Ok(Err(e)) => {
                    metrics::counter!(crate::observability::EXTERNAL_SYNC_FAILURES_TOTAL)
                        .increment(1);
                    tracing::warn!(%reservation_id, "calendar sync failed: {e}");
                    warnings.push(BookingWarning::ExternalSyncFailed(e.to_string()));
                }
                Err(_) => {
                    metrics::counter!(crate::observability::EXTERNAL_SYNC_FAILURES_TOTAL)
                        .increment(1);
                    tracing::warn!(%reservation_id, "calendar sync timed out");
                    warnings.push(BookingWarning::ExternalSyncFailed(
                        "external calendar timed out".into(),
                    ));
                }
            }
        }

        // 9. Secondary slot-lock marker.
        let lock = SlotLock {
            instructor_id: instructor.id,
            window,
            reservation_id,
            recorded_at: now_ms(),
        };
        if let Err(e) = self.locks.record(lock).await {
            tracing::warn!(%reservation_id, "slot lock not recorded: {e}");
            warnings.push(BookingWarning::SlotLockFailed(e.to_string()));
        }

        // 10. Notification intents for the external mailer.
        self.notifier.enqueue(NotificationIntent {
            student_id,
            kind: TemplateKind::BookingConfirmation,
            send_at: now,
        });
        let reminder_at = window.start - self.config.reminder_lead_hours * HOUR_MS;
        if reminder_at > now {
            self.notifier.enqueue(NotificationIntent {
                student_id,
                kind: TemplateKind::LessonReminder,
                send_at: reminder_at,
            });
        }

        tracing::info!(
            %reservation_id,
            instructor = %instructor.id,
            start = window.start,
            "booking committed"
        );
        Ok(BookingReceipt {
            reservation_id,
            instructor_id: instructor.id,
            student_id,
            window,
            external_event_id,
            warnings,
        })
    }

    /// Cancel a scheduled reservation, freeing its window for rebooking.
    pub async fn cancel_reservation(&self, id: Ulid) -> Result<Reservation, BookingError> {
        let existing = self.reservations.get(id).await?;
        if existing.status != ReservationStatus::Scheduled {
            return Err(BookingError::Validation {
                reason: format!("reservation {id} is already {}", existing.status.as_str()),
            });
        }
        let updated = self
            .reservations
            .update_status(id, ReservationStatus::Cancelled)
            .await?;
        self.notifier.enqueue(NotificationIntent {
            student_id: updated.student_id,
            kind: TemplateKind::CancellationNotice,
            send_at: now_ms(),
        });
        tracing::info!(reservation = %id, "reservation cancelled");
        Ok(updated)
    }

    /// Mark a scheduled reservation as completed. Completed lessons keep
    /// blocking their window, they just stop being cancellable.
    pub async fn complete_reservation(&self, id: Ulid) -> Result<Reservation, BookingError> {
        let existing = self.reservations.get(id).await?;
        if existing.status != ReservationStatus::Scheduled {
            return Err(BookingError::Validation {
                reason: format!("reservation {id} is already {}", existing.status.as_str()),
            });
        }
        Ok(self
            .reservations
            .update_status(id, ReservationStatus::Completed)
            .await?)
    }
}
