//! Trailing contribution window.
//!
//! Recomputed at the start of every aggregation and reused for every request
//! (including retries) made during that aggregation.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Number of calendar days covered by the window, today included.
pub const WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn trailing_year(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(WINDOW_DAYS - 1),
            end: today,
        }
    }

    pub fn ending_at(now: DateTime<Utc>) -> Self {
        Self::trailing_year(now.date_naive())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.len_days()).map(move |offset| start + Duration::days(offset))
    }

    /// GitLab `after` filter (exclusive), one day before the window opens.
    pub fn gitlab_after(&self) -> String {
        (self.start - Duration::days(1)).format("%Y-%m-%d").to_string()
    }

    /// GitLab `before` filter (exclusive), one day after the window closes.
    pub fn gitlab_before(&self) -> String {
        (self.end + Duration::days(1)).format("%Y-%m-%d").to_string()
    }

    pub fn github_from(&self) -> String {
        self.start.and_time(NaiveTime::MIN).and_utc().to_rfc3339()
    }

    /// Last second of the window's final day.
    pub fn github_to(&self) -> String {
        let next_midnight = (self.end + Duration::days(1)).and_time(NaiveTime::MIN);
        (next_midnight - Duration::seconds(1)).and_utc().to_rfc3339()
    }
}
