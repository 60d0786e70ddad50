//! Market-session predicate.
//!
//! Weekends are always closed; exchange holidays come from configuration;
//! maintaining the holiday table itself is an external concern.

use crate::config::CalendarConfig;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct MarketCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl MarketCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Build from config, skipping (and logging) malformed dates.
    pub fn from_config(cfg: &CalendarConfig) -> Self {
        let mut holidays = BTreeSet::new();
        for raw in &cfg.holidays {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(d) => {
                    holidays.insert(d);
                }
                Err(_) => warn!(value = %raw, "ignoring malformed holiday date {}", raw),
            }
        }
        Self { holidays }
    }

    pub fn is_session_day(&self, day: NaiveDate) -> bool {
        !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&day)
    }

    pub fn next_session_day(&self, from: NaiveDate) -> NaiveDate {
        let mut day = from + Days::new(1);
        while !self.is_session_day(day) {
            day = day + Days::new(1);
        }
        day
    }

    pub fn prev_session_day(&self, from: NaiveDate) -> NaiveDate {
        let mut day = from - Days::new(1);
        while !self.is_session_day(day) {
            day = day - Days::new(1);
        }
        day
    }
}
