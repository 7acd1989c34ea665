//! Derived statistics over a dated count series.

use crate::{CombinedSeries, ProviderSeries, Window};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionSummary {
    pub total: u64,
    pub active_days: u32,
    pub window_days: u32,
    pub longest_streak: u32,
    pub current_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busiest_day: Option<BusiestDay>,
    pub average_per_active_day: f64,
    /// Monday first.
    pub weekday_totals: [u64; 7],
    pub months: Vec<MonthSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusiestDay {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: String,
    pub total: u64,
    pub active_days: u32,
}

impl ContributionSummary {
    pub fn from_combined(series: &CombinedSeries, window: &Window) -> Self {
        summarize(series.days.iter().map(|d| (d.date, d.total)), window)
    }

    pub fn from_provider(series: &ProviderSeries, window: &Window) -> Self {
        summarize(series.days.iter().map(|d| (d.date, d.count)), window)
    }
}

/// Summarize `(date, count)` pairs; days outside the window and zero counts
/// are ignored, duplicates are summed.
pub fn summarize<I>(days: I, window: &Window) -> ContributionSummary
where
    I: IntoIterator<Item = (NaiveDate, u64)>,
{
    let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for (date, count) in days {
        if count > 0 && window.contains(date) {
            *by_date.entry(date).or_insert(0) += count;
        }
    }

    let total: u64 = by_date.values().sum();
    let active_days = by_date.len() as u32;

    let mut busiest: Option<BusiestDay> = None;
    let mut weekday_totals = [0u64; 7];
    let mut months: BTreeMap<String, MonthSummary> = BTreeMap::new();

    for (&date, &count) in &by_date {
        // BTreeMap order means the earliest date wins ties
        let busier = match &busiest {
            Some(b) => count > b.count,
            None => true,
        };
        if busier {
            busiest = Some(BusiestDay { date, count });
        }

        weekday_totals[date.weekday().num_days_from_monday() as usize] += count;

        let key = date.format("%Y-%m").to_string();
        let month = months.entry(key.clone()).or_insert_with(|| MonthSummary {
            month: key,
            total: 0,
            active_days: 0,
        });
        month.total += count;
        month.active_days += 1;
    }

    ContributionSummary {
        total,
        active_days,
        window_days: window.len_days() as u32,
        longest_streak: longest_streak(&by_date),
        current_streak: current_streak(&by_date, window.end),
        busiest_day: busiest,
        average_per_active_day: if active_days > 0 {
            total as f64 / active_days as f64
        } else {
            0.0
        },
        weekday_totals,
        months: months.into_values().collect(),
    }
}

fn longest_streak(by_date: &BTreeMap<NaiveDate, u64>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in by_date.keys() {
        run = match previous {
            Some(prev) if date - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

/// Consecutive active days ending today, or yesterday if today is still quiet.
fn current_streak(by_date: &BTreeMap<NaiveDate, u64>, today: NaiveDate) -> u32 {
    let mut cursor = if by_date.contains_key(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while by_date.contains_key(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}
