//! Provider-shaped payloads in, canonical per-day series out.

use crate::github::ContributionCalendar;
use crate::gitlab::GitLabEvent;
use crate::{ContributionDay, Platform, ProviderSeries, Window};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Raw fetch results, still in each provider's own shape.
#[derive(Debug, Clone)]
pub enum RawContributions {
    GitHub(ContributionCalendar),
    GitLab(Vec<GitLabEvent>),
}

impl RawContributions {
    pub fn platform(&self) -> Platform {
        match self {
            RawContributions::GitHub(_) => Platform::GitHub,
            RawContributions::GitLab(_) => Platform::GitLab,
        }
    }
}

pub fn normalize(raw: RawContributions, window: &Window) -> ProviderSeries {
    match raw {
        RawContributions::GitHub(calendar) => normalize_calendar(calendar, window),
        RawContributions::GitLab(events) => normalize_events(&events, window),
    }
}

/// `total` is recounted from the kept days. The calendar's own
/// `totalContributions` can include days the window drops.
fn normalize_calendar(calendar: ContributionCalendar, window: &Window) -> ProviderSeries {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for day in calendar.weeks.into_iter().flat_map(|w| w.days) {
        if day.count > 0 && window.contains(day.date) {
            *counts.entry(day.date).or_insert(0) += day.count;
        }
    }

    let total: u64 = counts.values().sum();
    if total != calendar.total_contributions {
        tracing::debug!(
            reported = calendar.total_contributions,
            counted = total,
            "calendar total differs from in-window days"
        );
    }

    ProviderSeries {
        total,
        days: into_days(counts, Platform::GitHub),
        error: None,
    }
}

fn normalize_events(events: &[GitLabEvent], window: &Window) -> ProviderSeries {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for event in events {
        let date = event.created_at.date_naive();
        if window.contains(date) {
            *counts.entry(date).or_insert(0) += 1;
        }
    }

    ProviderSeries {
        total: counts.values().sum(),
        days: into_days(counts, Platform::GitLab),
        error: None,
    }
}

fn into_days(counts: BTreeMap<NaiveDate, u64>, platform: Platform) -> Vec<ContributionDay> {
    counts
        .into_iter()
        .map(|(date, count)| ContributionDay {
            date,
            count,
            platform,
        })
        .collect()
}
