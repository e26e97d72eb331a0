//! `bl timeline`: the per-day cohort table of one batch.

use std::io::{self, Write};

use benchline_core::error::EngineError;
use benchline_core::prune::CohortTable;
use benchline_core::summary::analyze;
use clap::Args;
use serde::Serialize;

use super::{Context, fail};
use crate::output::{CliError, pretty_kv, pretty_section, render_mode};

/// Arguments for `bl timeline`.
#[derive(Args, Debug)]
pub struct TimelineArgs {
    /// Batch key (`RT-18231`) or its numeric suffix.
    pub key: String,

    /// Emit every day of the batch range.
    #[arg(long)]
    pub no_prune: bool,

    /// Override the unit threshold that marks the start of activity.
    #[arg(long, value_name = "N")]
    pub min_units: Option<usize>,
}

/// Payload for `bl timeline`.
#[derive(Debug, Serialize)]
pub struct TimelineReport {
    pub batch: String,
    pub title: String,
    pub pruned: bool,
    /// Units left out for lacking a creation date.
    pub skipped_units: Vec<String>,
    #[serde(flatten)]
    pub table: CohortTable,
}

/// Execute `bl timeline`.
pub fn run_timeline(args: &TimelineArgs, ctx: &Context) -> anyhow::Result<()> {
    let batch = ctx.load_batch(&args.key)?;

    let mut config = ctx.config.clone();
    if args.no_prune {
        config.prune.enabled = false;
    }
    if let Some(min_units) = args.min_units {
        config.prune.min_units = min_units;
    }

    let analysis = match analyze(&batch, &config, &config.states.outcome_labels) {
        Ok(analysis) => analysis,
        Err(err @ EngineError::NoBatchData { .. }) => {
            let mut skip = ctx.skip_list()?;
            ctx.exclude(&mut skip, &batch.key)?;
            return Err(fail(ctx.output, &CliError::from(&err)));
        }
        Err(err) => return Err(fail(ctx.output, &CliError::from(&err))),
    };

    let report = TimelineReport {
        batch: batch.key,
        title: batch.title,
        pruned: config.prune.enabled,
        skipped_units: analysis.skipped_units,
        table: analysis.timeline,
    };

    render_mode(ctx.output, &report, render_timeline_text, render_timeline_pretty)
}

fn cell(table: &CohortTable, day: chrono::NaiveDate, label: &str) -> String {
    table
        .days
        .get(&day)
        .and_then(|row| row.get(label))
        .and_then(Option::as_ref)
        .map_or_else(|| "-".to_string(), |members| members.len().to_string())
}

fn render_timeline_text(report: &TimelineReport, w: &mut dyn Write) -> io::Result<()> {
    let table = &report.table;
    writeln!(w, "day\t{}", table.labels.join("\t"))?;
    for &day in table.days.keys() {
        let cells: Vec<String> = table
            .labels
            .iter()
            .map(|label| cell(table, day, label))
            .collect();
        writeln!(w, "{day}\t{}", cells.join("\t"))?;
    }
    Ok(())
}

fn render_timeline_pretty(report: &TimelineReport, w: &mut dyn Write) -> io::Result<()> {
    let table = &report.table;
    pretty_section(w, &format!("{}  {}", report.batch, report.title))?;
    match (table.first_day(), table.last_day()) {
        (Some(first), Some(last)) => {
            pretty_kv(w, "Days", format!("{first} .. {last} ({})", table.len()))?;
        }
        _ => pretty_kv(w, "Days", "none")?,
    }
    pretty_kv(w, "Pruned", if report.pruned { "yes" } else { "no" })?;
    if !report.skipped_units.is_empty() {
        pretty_kv(w, "Skipped units", report.skipped_units.join(", "))?;
    }
    writeln!(w)?;

    let widths: Vec<usize> = table.labels.iter().map(|label| label.len().max(3)).collect();
    write!(w, "{:<10}", "Day")?;
    for (label, width) in table.labels.iter().zip(&widths) {
        write!(w, "  {label:>width$}")?;
    }
    writeln!(w)?;
    for &day in table.days.keys() {
        write!(w, "{day}")?;
        for (label, width) in table.labels.iter().zip(&widths) {
            write!(w, "  {:>width$}", cell(table, day, label))?;
        }
        writeln!(w)?;
    }
    Ok(())
}
