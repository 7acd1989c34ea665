//! Terminal heatmap: a dense, Sunday-first week grid over the window.

use chrono::{Datelike, Duration, NaiveDate};
use colored::Colorize;
use heatwave_core::{intensity, Window};
use std::collections::HashMap;

const DAY_LABELS: [&str; 7] = ["", "Mon", "", "Wed", "", "Fri", ""];
const LABEL_WIDTH: usize = 4;

const GRADE_COLORS: [(u8, u8, u8); 5] = [
    (0x16, 0x1B, 0x22),
    (0x0E, 0x44, 0x29),
    (0x00, 0x6D, 0x32),
    (0x26, 0xA6, 0x41),
    (0x39, 0xD3, 0x53),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphCell {
    pub date: NaiveDate,
    pub count: u64,
    pub intensity: u8,
}

/// Seven slots per week, Sunday first. `None` marks days outside the window.
pub type Week = [Option<GraphCell>; 7];

pub fn build_weeks(days: &[(NaiveDate, u64)], window: &Window) -> Vec<Week> {
    let counts: HashMap<NaiveDate, u64> = days.iter().copied().collect();

    let first_sunday =
        window.start - Duration::days(window.start.weekday().num_days_from_sunday() as i64);

    let mut weeks = Vec::new();
    let mut week_start = first_sunday;
    while week_start <= window.end {
        let mut week: Week = [None; 7];
        for (slot, cell) in week.iter_mut().enumerate() {
            let date = week_start + Duration::days(slot as i64);
            if window.contains(date) {
                let count = counts.get(&date).copied().unwrap_or(0);
                *cell = Some(GraphCell {
                    date,
                    count,
                    intensity: intensity(count),
                });
            }
        }
        weeks.push(week);
        week_start += Duration::days(7);
    }
    weeks
}

fn paint(grade: u8, glyph: &str) -> String {
    let (r, g, b) = GRADE_COLORS[grade.min(4) as usize];
    glyph.truecolor(r, g, b).to_string()
}

/// Render the grid, trimmed from the left to at most `max_weeks` columns.
pub fn render(weeks: &[Week], max_weeks: usize) -> String {
    let shown = weeks.len().min(max_weeks);
    let start = weeks.len() - shown;
    let weeks = &weeks[start..];

    let mut out = String::new();

    let mut header = vec![' '; weeks.len() * 2];
    let mut last_month = None;
    let mut free_from = 0;
    for (i, week) in weeks.iter().enumerate() {
        let Some(first) = week.iter().flatten().next() else {
            continue;
        };
        if last_month == Some(first.date.month()) {
            continue;
        }
        last_month = Some(first.date.month());

        let label = first.date.format("%b").to_string();
        let pos = i * 2;
        if pos >= free_from && pos + label.len() <= header.len() {
            for (k, ch) in label.chars().enumerate() {
                header[pos + k] = ch;
            }
            free_from = pos + label.len() + 1;
        }
    }
    out.push_str(&" ".repeat(LABEL_WIDTH));
    out.push_str(header.iter().collect::<String>().trim_end());
    out.push('\n');

    for (day_idx, label) in DAY_LABELS.iter().enumerate() {
        out.push_str(&format!("{:<width$}", label, width = LABEL_WIDTH));
        for week in weeks {
            match week[day_idx] {
                Some(cell) => out.push_str(&paint(cell.intensity, "■ ")),
                None => out.push_str("  "),
            }
        }
        out.push('\n');
    }

    out.push_str(&format!("{:>width$}Less ", "", width = LABEL_WIDTH));
    for grade in 0..=4 {
        out.push_str(&paint(grade, "■ "));
    }
    out.push_str("More\n");
    out
}
