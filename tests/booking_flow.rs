use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Weekday};
use ulid::Ulid;

use drivetime::calendar::{CalendarError, CalendarEventDraft, ExternalCalendarProvider};
use drivetime::config::EngineConfig;
use drivetime::engine::{BookingError, ConflictSource};
use drivetime::ledger::CreditStore;
use drivetime::model::{
    BookingChannel, LessonPlan, Ms, ReservationStatus, TimeWindow, HOUR_MS, MINUTE_MS,
};
use drivetime::notify::TemplateKind;
use drivetime::rules::{AvailabilityRuleSet, InstructorProfile};
use drivetime::tenant::SchoolRegistry;

// ── Test infrastructure ──────────────────────────────────────

struct QuietCalendar;

#[async_trait]
impl ExternalCalendarProvider for QuietCalendar {
    async fn busy_intervals(
        &self,
        _account: &str,
        _window: TimeWindow,
    ) -> Result<Vec<TimeWindow>, CalendarError> {
        Ok(Vec::new())
    }

    async fn create_event(
        &self,
        _account: &str,
        draft: &CalendarEventDraft,
    ) -> Result<String, CalendarError> {
        Ok(format!("evt-{}", draft.reservation_id))
    }
}

fn plans() -> Vec<LessonPlan> {
    vec![
        LessonPlan {
            key: "standard".into(),
            fixed_duration_minutes: None,
            cooldown_hours: None,
            sessions_cost: 1,
            minutes_cost: 120,
        },
        LessonPlan {
            key: "highway-2h".into(),
            fixed_duration_minutes: Some(120),
            cooldown_hours: Some(24),
            sessions_cost: 1,
            minutes_cost: 120,
        },
    ]
}

fn registry() -> SchoolRegistry {
    SchoolRegistry::new(Arc::new(QuietCalendar), plans(), EngineConfig::default())
}

fn instructor() -> InstructorProfile {
    InstructorProfile {
        id: Ulid::new(),
        rules: AvailabilityRuleSet {
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            daily_open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            daily_close: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            break_window: Some((
                NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            )),
            slot_granularity_minutes: 120,
            session_duration_minutes: 120,
            min_notice_hours: 0,
            utc_offset_minutes: 0,
        },
        calendar_account: Some("inst-cal".into()),
    }
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

fn at(h: u32, m: u32) -> Ms {
    monday()
        .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
        .and_utc()
        .timestamp_millis()
}

fn two_hours_from(h: u32) -> TimeWindow {
    TimeWindow::new(at(h, 0), at(h, 0) + 120 * MINUTE_MS)
}

// ── End-to-end flows ─────────────────────────────────────────

#[tokio::test]
async fn student_journey_list_book_cancel_rebook() {
    let registry = registry();
    let school = registry.get_or_create("rijschool-centrum").unwrap();
    let hub = registry.hub("rijschool-centrum").unwrap();
    let coach = instructor();
    let student = Ulid::new();
    school.credits().grant(student, 5, 600).await.unwrap();

    // The picker shows the canonical weekday grid around the lunch break.
    let offered = school.offerable_starts(&coach, monday()).await.unwrap();
    assert_eq!(offered, vec![at(9, 0), at(11, 0), at(14, 0), at(16, 0)]);

    let mut intents = hub.subscribe();
    let receipt = school
        .book(
            student,
            &coach,
            two_hours_from(11),
            "standard",
            BookingChannel::Student,
        )
        .await
        .unwrap();
    assert!(receipt.warnings.is_empty());
    assert_eq!(
        intents.try_recv().unwrap().kind,
        TemplateKind::BookingConfirmation
    );
    assert_eq!(
        intents.try_recv().unwrap().kind,
        TemplateKind::LessonReminder
    );

    // The booked slot disappears; its back-to-back neighbours stay.
    let offered = school.offerable_starts(&coach, monday()).await.unwrap();
    assert_eq!(offered, vec![at(9, 0), at(14, 0), at(16, 0)]);

    // Cancelling reopens it.
    school
        .cancel_reservation(receipt.reservation_id)
        .await
        .unwrap();
    let offered = school.offerable_starts(&coach, monday()).await.unwrap();
    assert_eq!(offered, vec![at(9, 0), at(11, 0), at(14, 0), at(16, 0)]);

    let rebooked = school
        .book(
            student,
            &coach,
            two_hours_from(11),
            "standard",
            BookingChannel::Student,
        )
        .await
        .unwrap();
    assert_ne!(rebooked.reservation_id, receipt.reservation_id);
}

#[tokio::test]
async fn cooldown_plan_enforces_spacing_end_to_end() {
    let registry = registry();
    let school = registry.get_or_create("spacing").unwrap();
    let coach = instructor();
    let student = Ulid::new();
    school.credits().grant(student, 5, 600).await.unwrap();

    let first = two_hours_from(9);
    school
        .book(student, &coach, first, "highway-2h", BookingChannel::Student)
        .await
        .unwrap();

    let until = school
        .credits()
        .cooldown_until(student)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(until, first.end + 24 * HOUR_MS);

    // Same plan again before the spacing elapses — rejected with the
    // earliest retry time.
    let retry = school
        .book(
            student,
            &coach,
            two_hours_from(14),
            "highway-2h",
            BookingChannel::Student,
        )
        .await;
    match retry {
        Err(BookingError::Cooldown { until: reported, .. }) => assert_eq!(reported, until),
        other => panic!("expected cooldown rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_length_for_fixed_plan_is_rejected_up_front() {
    let registry = registry();
    let school = registry.get_or_create("fixed").unwrap();
    let coach = instructor();
    let student = Ulid::new();
    school.credits().grant(student, 1, 120).await.unwrap();

    let ninety = TimeWindow::new(at(9, 0), at(10, 30));
    let result = school
        .book(student, &coach, ninety, "highway-2h", BookingChannel::Student)
        .await;
    assert!(matches!(result, Err(BookingError::Validation { .. })));
    assert!(school.list_reservations(coach.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn many_students_race_for_one_slot() {
    let registry = registry();
    let school = registry.get_or_create("race").unwrap();
    let coach = Arc::new(instructor());
    let window = two_hours_from(9);

    let mut students = Vec::new();
    for _ in 0..6 {
        let id = Ulid::new();
        school.credits().grant(id, 1, 120).await.unwrap();
        students.push(id);
    }

    let mut attempts = Vec::new();
    for &student in &students {
        let school = school.clone();
        let coach = coach.clone();
        attempts.push(tokio::spawn(async move {
            school
                .book(student, &coach, window, "standard", BookingChannel::Student)
                .await
        }));
    }
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for loser in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            loser,
            Err(BookingError::Conflict {
                source: ConflictSource::Internal,
                ..
            })
        ));
    }

    // Exactly one reservation landed, and only the winner paid.
    let day = school.reservations_for_day(&coach, monday()).await.unwrap();
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].status, ReservationStatus::Scheduled);
    let mut paid = 0;
    for &student in &students {
        let balance = school.credits().balance(student).await.unwrap().unwrap();
        assert!(balance.sessions_remaining >= 0);
        if balance.sessions_remaining == 0 {
            paid += 1;
        }
    }
    assert_eq!(paid, 1);
}

#[tokio::test]
async fn full_day_gets_packed_back_to_back() {
    let registry = registry();
    let school = registry.get_or_create("packed").unwrap();
    let coach = instructor();
    let student = Ulid::new();
    school.credits().grant(student, 10, 1200).await.unwrap();

    // Drain the day slot by slot; every offer must remain bookable.
    loop {
        let offered = school.offerable_starts(&coach, monday()).await.unwrap();
        let Some(&start) = offered.first() else { break };
        school
            .book(
                student,
                &coach,
                TimeWindow::new(start, start + 120 * MINUTE_MS),
                "standard",
                BookingChannel::Student,
            )
            .await
            .unwrap();
    }

    let day = school.reservations_for_day(&coach, monday()).await.unwrap();
    assert_eq!(day.len(), 4);
    // 9–11 and 11–13 landed back-to-back.
    assert!(day.iter().any(|r| r.window == two_hours_from(9)));
    assert!(day.iter().any(|r| r.window == two_hours_from(11)));
}
