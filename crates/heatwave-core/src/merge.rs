//! Merge two provider series into one dated series with intensity buckets.

use crate::{CombinedDay, CombinedSeries, ContributionDay, Platform, ProviderSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const MAX_INTENSITY: u8 = 4;

/// Heatmap bucket for a day's combined total: one step per three contributions.
pub fn intensity(total: u64) -> u8 {
    (total / 3).min(MAX_INTENSITY as u64) as u8
}

/// Combine both providers, or `None` when either one failed.
///
/// Totals come from each provider's reported `total`, not from the combined
/// days, so a series with partial day data keeps its full count. Days are
/// keyed by their own platform, so swapping the series yields the same result.
pub fn merge(github: &ProviderSeries, gitlab: &ProviderSeries) -> Option<CombinedSeries> {
    if !github.is_ok() || !gitlab.is_ok() {
        return None;
    }

    let mut builder = CombinedBuilder::default();
    builder.add_series(github);
    builder.add_series(gitlab);

    let mut totals = DayAccumulator::default();
    totals.add_total(owner(github, Platform::GitHub), github.total);
    totals.add_total(owner(gitlab, Platform::GitLab), gitlab.total);

    Some(CombinedSeries {
        total: totals.total(),
        github_total: totals.github,
        gitlab_total: totals.gitlab,
        days: builder.build(),
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct DayAccumulator {
    github: u64,
    gitlab: u64,
}

/// Platform a series belongs to; an empty series belongs to its slot.
fn owner(series: &ProviderSeries, slot: Platform) -> Platform {
    series.days.first().map_or(slot, |d| d.platform)
}

impl DayAccumulator {
    fn add(&mut self, day: &ContributionDay) {
        self.add_total(day.platform, day.count);
    }

    fn add_total(&mut self, platform: Platform, count: u64) {
        match platform {
            Platform::GitHub => self.github += count,
            Platform::GitLab => self.gitlab += count,
        }
    }

    fn total(&self) -> u64 {
        self.github + self.gitlab
    }

    fn into_day(self, date: NaiveDate) -> CombinedDay {
        let total = self.total();
        CombinedDay {
            date,
            github: self.github,
            gitlab: self.gitlab,
            total,
            intensity: intensity(total),
        }
    }
}

/// Order-independent accumulator behind [`merge`].
#[derive(Debug, Default)]
pub struct CombinedBuilder {
    days: BTreeMap<NaiveDate, DayAccumulator>,
}

impl CombinedBuilder {
    pub fn add_series(&mut self, series: &ProviderSeries) -> &mut Self {
        for day in &series.days {
            self.add_day(day);
        }
        self
    }

    pub fn add_day(&mut self, day: &ContributionDay) -> &mut Self {
        self.days.entry(day.date).or_default().add(day);
        self
    }

    /// Dated days with a non-zero total, ascending.
    pub fn build(self) -> Vec<CombinedDay> {
        self.days
            .into_iter()
            .filter(|(_, acc)| acc.total() > 0)
            .map(|(date, acc)| acc.into_day(date))
            .collect()
    }
}
