use chrono::NaiveDate;

use crate::model::{Ms, TimeWindow};
use crate::rules::AvailabilityRuleSet;

// ── Slot Generation ──────────────────────────────────────────────

/// Candidate start times for one instructor-day.
///
/// Pure: same inputs, same output, no side effects. `existing` is the set of
/// blocking reservation windows for the date; the caller fetches it once and
/// the function never touches a store. Degenerate rule sets (empty day,
/// granularity wider than the day, break spanning everything) produce an
/// empty sequence, not an error.
///
/// A candidate survives when the whole session fits inside the working
/// window (no clipping), it starts at or after the notice limit, and it
/// overlaps neither the break nor any existing reservation. A candidate
/// blocked by the break re-anchors the walk at the break's end, so the
/// afternoon grid starts right when the instructor is back — a 9–18 day
/// with a 13–14 break on a 2h grid offers 9:00, 11:00, 14:00, 16:00.
pub fn generate_slots(
    rules: &AvailabilityRuleSet,
    date: NaiveDate,
    existing: &[TimeWindow],
    now: Ms,
) -> Vec<Ms> {
    if rules.slot_granularity_minutes == 0 || rules.session_duration_minutes == 0 {
        return Vec::new();
    }
    if !rules.is_working_day(date) {
        return Vec::new();
    }
    let Some(day) = rules.day_window(date) else {
        return Vec::new();
    };

    let notice_limit = rules.notice_limit(now);
    let lunch = rules.break_window_for(date);
    let step = rules.granularity_ms();
    let duration = rules.session_duration_ms();

    let mut starts = Vec::new();
    let mut candidate = day.start;
    while candidate < day.end {
        let end = candidate + duration;
        if end > day.end {
            // Later candidates only end later — nothing further can fit.
            break;
        }
        let window = TimeWindow::new(candidate, end);
        if let Some(b) = lunch
            && b.overlaps(&window)
        {
            // Strict overlap guarantees candidate < b.end, so this advances.
            candidate = b.end;
            continue;
        }
        let bookable =
            candidate >= notice_limit && !existing.iter().any(|r| r.overlaps(&window));
        if bookable {
            starts.push(candidate);
        }
        candidate += step;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HOUR_MS, MINUTE_MS};
    use chrono::{NaiveTime, Weekday};

    /// Weekdays 9–18, break 13–14, 2h slots on a 2h grid, no notice.
    fn school_rules() -> AvailabilityRuleSet {
        AvailabilityRuleSet {
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
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 10).unwrap()
    }

    /// UTC instant for `monday()` at the given wall-clock hour:minute.
    fn at(h: u32, m: u32) -> Ms {
        monday()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn weekday_grid_with_lunch_break() {
        let starts = generate_slots(&school_rules(), monday(), &[], 0);
        assert_eq!(starts, vec![at(9, 0), at(11, 0), at(14, 0), at(16, 0)]);
    }

    #[test]
    fn longer_sessions_shrink_the_grid() {
        let mut rules = school_rules();
        rules.session_duration_minutes = 180;
        // 11:00–14:00 hits the break; 16:00 would end past close.
        let starts = generate_slots(&rules, monday(), &[], 0);
        assert_eq!(starts, vec![at(9, 0), at(14, 0)]);
    }

    #[test]
    fn non_working_day_is_empty() {
        let sunday = NaiveDate::from_ymd_opt(2026, 8, 9).unwrap();
        assert!(generate_slots(&school_rules(), sunday, &[], 0).is_empty());
    }

    #[test]
    fn existing_reservations_mask_slots() {
        let taken = vec![TimeWindow::new(at(11, 0), at(13, 0))];
        let starts = generate_slots(&school_rules(), monday(), &taken, 0);
        assert_eq!(starts, vec![at(9, 0), at(14, 0), at(16, 0)]);
    }

    #[test]
    fn back_to_back_reservation_does_not_mask() {
        // A lesson ending exactly at 11:00 leaves the 11:00 slot offerable.
        let taken = vec![TimeWindow::new(at(9, 0), at(11, 0))];
        let starts = generate_slots(&school_rules(), monday(), &taken, 0);
        assert_eq!(starts, vec![at(11, 0), at(14, 0), at(16, 0)]);
    }

    #[test]
    fn notice_window_trims_the_morning() {
        let mut rules = school_rules();
        rules.min_notice_hours = 2;
        // "now" is 10:00 on the day — earliest bookable start is 12:00, and
        // the first grid slot at or after that which clears the break is 14:00.
        let starts = generate_slots(&rules, monday(), &[], at(10, 0));
        assert_eq!(starts, vec![at(14, 0), at(16, 0)]);
    }

    #[test]
    fn notice_uses_instructor_wall_clock() {
        let mut rules = school_rules();
        rules.utc_offset_minutes = 120; // UTC+2
        rules.min_notice_hours = 0;
        // 9:00 wall-clock at UTC+2 is 7:00 UTC. With "now" at 8:00 UTC the
        // 9:00 local slot is already past and must not be offered. Surviving
        // starts, as UTC instants: 11:00 local, post-break 14:00 local
        // (12:00 UTC), and 16:00 local.
        let eight_utc = at(8, 0);
        let starts = generate_slots(&rules, monday(), &[], eight_utc);
        assert_eq!(starts, vec![at(9, 0), at(12, 0), at(14, 0)]);
    }

    #[test]
    fn zero_length_day_is_empty() {
        let mut rules = school_rules();
        rules.daily_close = rules.daily_open;
        assert!(generate_slots(&rules, monday(), &[], 0).is_empty());
    }

    #[test]
    fn granularity_wider_than_day_is_empty() {
        let mut rules = school_rules();
        rules.daily_close = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        rules.slot_granularity_minutes = 24 * 60;
        // First candidate (9:00) ends at 11:00, past the 10:00 close.
        assert!(generate_slots(&rules, monday(), &[], 0).is_empty());
    }

    #[test]
    fn session_longer_than_day_is_empty() {
        let mut rules = school_rules();
        rules.session_duration_minutes = 10 * 60;
        assert!(generate_slots(&rules, monday(), &[], 0).is_empty());
    }

    #[test]
    fn break_spanning_the_day_is_empty() {
        let mut rules = school_rules();
        rules.break_window = Some((
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        ));
        assert!(generate_slots(&rules, monday(), &[], 0).is_empty());
    }

    #[test]
    fn zero_granularity_is_empty_not_hung() {
        let mut rules = school_rules();
        rules.slot_granularity_minutes = 0;
        assert!(generate_slots(&rules, monday(), &[], 0).is_empty());
    }

    #[test]
    fn generation_is_pure() {
        let taken = vec![TimeWindow::new(at(11, 0), at(12, 30))];
        let first = generate_slots(&school_rules(), monday(), &taken, at(8, 0));
        let second = generate_slots(&school_rules(), monday(), &taken, at(8, 0));
        assert_eq!(first, second);
        // Input untouched.
        assert_eq!(taken, vec![TimeWindow::new(at(11, 0), at(12, 30))]);
    }

    #[test]
    fn generated_slots_fit_and_never_overlap() {
        let mut rules = school_rules();
        rules.slot_granularity_minutes = 45;
        rules.session_duration_minutes = 90;
        let taken = vec![TimeWindow::new(at(10, 30), at(12, 0))];
        let day = rules.day_window(monday()).unwrap();
        let duration = rules.session_duration_ms();

        let starts = generate_slots(&rules, monday(), &taken, 0);
        assert!(!starts.is_empty());
        for (i, &s) in starts.iter().enumerate() {
            let window = TimeWindow::new(s, s + duration);
            assert!(s >= day.start);
            assert!(window.end <= day.end);
            assert!(!taken.iter().any(|t| t.overlaps(&window)));
            if i > 0 {
                assert!(starts[i - 1] < s); // strictly increasing, no dupes
            }
        }
    }

    #[test]
    fn fine_granularity_offers_overlapping_candidates() {
        // Candidate starts may be closer together than the session length;
        // overlap between candidates is the booker's race to lose, not the
        // generator's to referee.
        let mut rules = school_rules();
        rules.break_window = None;
        rules.slot_granularity_minutes = 30;
        rules.session_duration_minutes = 60;
        let starts = generate_slots(&rules, monday(), &[], 0);
        assert_eq!(starts.first(), Some(&at(9, 0)));
        assert_eq!(starts[1], at(9, 30));
        // Last candidate must still fit entirely: 17:00 + 60m = close.
        assert_eq!(*starts.last().unwrap(), at(17, 0));
        assert_eq!(starts.len(), 17);
    }

    #[test]
    fn minute_grid_stays_exact() {
        let mut rules = school_rules();
        rules.break_window = None;
        rules.slot_granularity_minutes = 50;
        rules.session_duration_minutes = 50;
        let starts = generate_slots(&rules, monday(), &[], 0);
        assert_eq!(starts[0], at(9, 0));
        assert_eq!(starts[1], at(9, 50));
        assert_eq!(starts[1] - starts[0], 50 * MINUTE_MS);
        let last = *starts.last().unwrap();
        assert!(last + rules.session_duration_ms() <= at(18, 0));
        assert_eq!((last - at(9, 0)) % (50 * MINUTE_MS), 0);
    }

    #[test]
    fn empty_day_when_now_is_far_future() {
        let starts = generate_slots(&school_rules(), monday(), &[], at(18, 0) + HOUR_MS);
        assert!(starts.is_empty());
    }
}
