//! Unit tests for the market-session predicate

use chrono::NaiveDate;
use signalyst::config::CalendarConfig;
use signalyst::core::MarketCalendar;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_weekends_are_closed() {
    let calendar = MarketCalendar::new([]);
    assert!(!calendar.is_session_day(date(2026, 8, 8))); // Saturday
    assert!(!calendar.is_session_day(date(2026, 8, 9))); // Sunday
    assert!(calendar.is_session_day(date(2026, 8, 10))); // Monday
}

#[test]
fn test_holidays_are_closed() {
    let calendar = MarketCalendar::new([date(2026, 2, 17)]);
    assert!(!calendar.is_session_day(date(2026, 2, 17)));
    assert!(calendar.is_session_day(date(2026, 2, 13)));
}

#[test]
fn test_next_and_prev_skip_closed_days() {
    // Friday 2026-02-13; Mon 2026-02-16 and Tue 2026-02-17 are holidays.
    let calendar = MarketCalendar::new([date(2026, 2, 16), date(2026, 2, 17)]);
    assert_eq!(
        calendar.next_session_day(date(2026, 2, 13)),
        date(2026, 2, 18)
    );
    assert_eq!(
        calendar.prev_session_day(date(2026, 2, 18)),
        date(2026, 2, 13)
    );
}

#[test]
fn test_from_config_ignores_malformed_dates() {
    let cfg = CalendarConfig {
        holidays: vec!["2026-02-17".to_string(), "not-a-date".to_string()],
    };
    let calendar = MarketCalendar::from_config(&cfg);
    assert!(!calendar.is_session_day(date(2026, 2, 17)));
    assert!(calendar.is_session_day(date(2026, 2, 18)));
}
