use crate::graph;
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use heatwave_core::{
    Aggregator, Config, Contributions, ContributionSummary, ContributionsResponse, Platform,
    TokenStore,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::runtime::Runtime;

const GRAPH_WEEKS: usize = 53;

pub struct Options {
    pub json: bool,
    pub output: Option<std::path::PathBuf>,
    pub graph: bool,
    pub no_spinner: bool,
}

pub fn run<S>(config: &Config, store: S, profile: &str, opts: Options) -> Result<()>
where
    S: TokenStore + 'static,
{
    let aggregator = Aggregator::from_config(config, Arc::new(store));

    let spinner = if opts.no_spinner || (opts.json && opts.output.is_none()) {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner());
        pb.set_message(format!("Fetching contributions for {}...", profile));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    };

    let rt = Runtime::new()?;
    let result = rt.block_on(aggregator.aggregate(profile));

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let contributions = result.context("Failed to read provider connections")?;
    let response = ContributionsResponse::new(contributions, chrono::Utc::now());

    if opts.json || opts.output.is_some() {
        let body = serde_json::to_string_pretty(&response)?;
        match &opts.output {
            Some(path) => {
                std::fs::write(path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!(
                    "{}",
                    format!("✓ Contributions written to {}", path.display()).green()
                );
            }
            None => println!("{body}"),
        }
        return Ok(());
    }

    print_providers(&response.contributions);

    match &response.summary {
        Some(summary) => print_summary(summary),
        None => println!(
            "\n  {}",
            "No contribution data. Connect a provider with `heatwave connect`.".bright_black()
        ),
    }

    if opts.graph {
        let days = graph_days(&response.contributions);
        let weeks = graph::build_weeks(&days, &response.contributions.window);
        println!();
        print!("{}", graph::render(&weeks, GRAPH_WEEKS));
    }

    Ok(())
}

fn print_providers(contributions: &Contributions) {
    println!();
    for platform in Platform::iter() {
        let name = format!("{:<8}", platform.display_name());
        match (contributions.slot(platform), contributions.errors.get(&platform)) {
            (Some(series), _) => println!(
                "  {} {} {} contributions on {} days",
                "✓".green(),
                name.bold(),
                format_number(series.total),
                series.days.len()
            ),
            (None, Some(kind)) => println!(
                "  {} {} {}{}",
                "✗".red(),
                name.bold(),
                kind.as_str().red(),
                hint(platform, *kind).bright_black()
            ),
            (None, None) => println!(
                "  {} {} {}",
                "-".bright_black(),
                name.bright_black(),
                "not connected".bright_black()
            ),
        }
    }
}

fn hint(platform: Platform, kind: heatwave_core::ErrorKind) -> String {
    match kind {
        heatwave_core::ErrorKind::ReauthRequired => {
            format!(" (reconnect with `heatwave connect {}`)", platform)
        }
        heatwave_core::ErrorKind::RateLimited => " (try again later)".to_string(),
        heatwave_core::ErrorKind::FetchFailed => " (run with --debug for details)".to_string(),
    }
}

fn print_summary(summary: &ContributionSummary) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Metric", "Value"]);

    table.add_row(vec!["Total".to_string(), format_number(summary.total)]);
    table.add_row(vec![
        "Active days".to_string(),
        format!("{} / {}", summary.active_days, summary.window_days),
    ]);
    table.add_row(vec![
        "Longest streak".to_string(),
        format!("{} days", summary.longest_streak),
    ]);
    table.add_row(vec![
        "Current streak".to_string(),
        format!("{} days", summary.current_streak),
    ]);
    if let Some(busiest) = &summary.busiest_day {
        table.add_row(vec![
            "Busiest day".to_string(),
            format!("{} ({})", busiest.date, format_number(busiest.count)),
        ]);
    }
    table.add_row(vec![
        "Avg per active day".to_string(),
        format!("{:.1}", summary.average_per_active_day),
    ]);

    println!("\n{table}");

    if !summary.months.is_empty() {
        let mut months = Table::new();
        months.set_content_arrangement(ContentArrangement::Dynamic);
        months.set_header(vec!["Month", "Contributions", "Active days"]);
        for m in &summary.months {
            months.add_row(vec![
                m.month.clone(),
                format_number(m.total),
                m.active_days.to_string(),
            ]);
        }
        println!("{months}");
    }
}

/// Combined days when both providers succeeded, otherwise the one that did.
fn graph_days(contributions: &Contributions) -> Vec<(chrono::NaiveDate, u64)> {
    if let Some(combined) = &contributions.combined {
        return combined.days.iter().map(|d| (d.date, d.total)).collect();
    }
    Platform::iter()
        .filter_map(|p| contributions.slot(p))
        .flat_map(|s| s.days.iter().map(|d| (d.date, d.count)))
        .collect()
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
