//! `bl summary`: closure, activity window and throughput per batch.

use std::io::{self, Write};

use benchline_core::dataset::SkipList;
use benchline_core::error::EngineError;
use benchline_core::model::Batch;
use benchline_core::summary::{BatchSummary, summarize};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use super::{Context, closed_label, fail};
use crate::output::{CliError, pretty_kv, pretty_section, render_mode};

/// Arguments for `bl summary`.
#[derive(Args, Debug, Default)]
pub struct SummaryArgs {
    /// Batch key or numeric suffix. Summarizes every batch when omitted.
    pub key: Option<String>,
}

/// Payload for `bl summary`.
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub summaries: Vec<BatchSummary>,
    /// Batches with no usable data; now on the skip-list.
    pub excluded: Vec<String>,
}

/// Execute `bl summary`.
pub fn run_summary(args: &SummaryArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut skip = ctx.skip_list()?;
    let mut report = SummaryReport {
        summaries: Vec::new(),
        excluded: Vec::new(),
    };

    if let Some(key) = &args.key {
        let batch = ctx.load_batch(key)?;
        match summarize(&batch, &ctx.config) {
            Ok(summary) => report.summaries.push(summary),
            Err(err) => {
                if matches!(err, EngineError::NoBatchData { .. }) {
                    ctx.exclude(&mut skip, &batch.key)?;
                }
                return Err(fail(ctx.output, &CliError::from(&err)));
            }
        }
    } else {
        for meta in ctx.check(ctx.dataset.batch_metas())? {
            if skip.contains(&meta.key) {
                debug!(batch = %meta.key, "on skip-list");
                continue;
            }
            let batch = ctx.check(ctx.dataset.load_batch(&meta))?;
            summarize_into(ctx, &mut skip, &batch, &mut report)?;
        }
    }

    render_mode(ctx.output, &report, render_summary_text, render_summary_pretty)
}

fn summarize_into(
    ctx: &Context,
    skip: &mut SkipList,
    batch: &Batch,
    report: &mut SummaryReport,
) -> anyhow::Result<()> {
    match summarize(batch, &ctx.config) {
        Ok(summary) => report.summaries.push(summary),
        Err(EngineError::NoBatchData { batch: key }) => {
            ctx.exclude(skip, &key)?;
            report.excluded.push(key);
        }
        Err(err @ EngineError::MissingCreationDate { .. }) => {
            return Err(fail(ctx.output, &CliError::from(&err)));
        }
    }
    Ok(())
}

fn day_or_dash(day: Option<chrono::NaiveDate>) -> String {
    day.map_or_else(|| "-".to_string(), |day| day.to_string())
}

fn render_summary_text(report: &SummaryReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "KEY  STATE  UNITS  FIRST  LAST  BUSINESS_DAYS  RATE")?;
    for s in &report.summaries {
        writeln!(
            w,
            "{}  {}  {}  {}  {}  {}  {:.2}",
            s.key,
            closed_label(s.closed_state),
            s.unit_count,
            day_or_dash(s.first_activity_date),
            day_or_dash(s.last_activity_date),
            s.business_day_count,
            s.process_rate
        )?;
    }
    for key in &report.excluded {
        writeln!(w, "{key}  excluded")?;
    }
    Ok(())
}

fn render_summary_pretty(report: &SummaryReport, w: &mut dyn Write) -> io::Result<()> {
    for s in &report.summaries {
        pretty_section(w, &format!("{}  {}", s.key, s.title))?;
        pretty_kv(w, "Anchor", s.anchor_date.to_string())?;
        pretty_kv(w, "State", closed_label(s.closed_state))?;
        pretty_kv(
            w,
            "Units",
            format!("{} boards, {} chassis", s.unit_count, s.secondary_unit_count),
        )?;
        pretty_kv(w, "First activity", day_or_dash(s.first_activity_date))?;
        pretty_kv(w, "Last activity", day_or_dash(s.last_activity_date))?;
        pretty_kv(w, "Business days", s.business_day_count.to_string())?;
        pretty_kv(w, "Boards/day", format!("{:.2}", s.process_rate))?;

        let terminal = &s.terminal_cohort_counts;
        writeln!(w, "\nOutcomes as of {}:", day_or_dash(terminal.day))?;
        for (label, count) in &terminal.counts {
            writeln!(w, "  {label}: {count}")?;
        }
        if let Some(error) = &terminal.error {
            match terminal.error_code {
                Some(code) => writeln!(w, "  warning[{code}]: {error}")?,
                None => writeln!(w, "  warning: {error}")?,
            }
        }
        writeln!(w)?;
    }
    if !report.excluded.is_empty() {
        pretty_kv(w, "Excluded", report.excluded.join(", "))?;
    }
    Ok(())
}
