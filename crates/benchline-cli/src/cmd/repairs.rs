//! `bl repairs`: milestone transitions and technician notes per board.

use std::io::{self, Write};

use benchline_core::model::timestamp::format_wall_clock;
use benchline_core::repair::{RepairEvent, RepairRecord, repair_records};
use chrono::TimeDelta;
use clap::Args;
use serde::Serialize;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `bl repairs`.
#[derive(Args, Debug)]
pub struct RepairsArgs {
    /// Batch key (`RT-18231`) or its numeric suffix.
    pub key: String,
}

/// Payload for `bl repairs`.
#[derive(Debug, Serialize)]
pub struct RepairsReport {
    pub batch: String,
    pub records: Vec<RepairRecord>,
}

/// Execute `bl repairs`.
pub fn run_repairs(args: &RepairsArgs, ctx: &Context) -> anyhow::Result<()> {
    let batch = ctx.load_batch(&args.key)?;
    let report = RepairsReport {
        records: repair_records(&batch, &ctx.config.repairs),
        batch: batch.key,
    };
    render_mode(ctx.output, &report, render_repairs_text, render_repairs_pretty)
}

/// `1d 4h 30m` style span; minutes are the finest unit shown.
fn format_span(span: TimeDelta) -> String {
    let minutes = span.num_minutes().max(0);
    let (days, rem) = (minutes / (24 * 60), minutes % (24 * 60));
    let (hours, minutes) = (rem / 60, rem % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn event_line(event: &RepairEvent) -> String {
    match event {
        RepairEvent::StatusChange {
            timestamp,
            author,
            to,
            duration,
            ..
        } => {
            let span = duration.map_or_else(|| "current".to_string(), format_span);
            format!("{}  status   {to} ({span}) by {author}", format_wall_clock(timestamp))
        }
        RepairEvent::Comment {
            timestamp,
            author,
            body,
        } => format!("{}  comment  {author}: {body}", format_wall_clock(timestamp)),
    }
}

fn render_repairs_text(report: &RepairsReport, w: &mut dyn Write) -> io::Result<()> {
    for record in &report.records {
        for event in &record.events {
            writeln!(w, "{}\t{}", record.serial, event_line(event))?;
        }
    }
    Ok(())
}

fn render_repairs_pretty(report: &RepairsReport, w: &mut dyn Write) -> io::Result<()> {
    if report.records.is_empty() {
        return writeln!(w, "No completed repairs in {}.", report.batch);
    }
    for record in &report.records {
        pretty_section(w, &format!("{} ({})", record.serial, record.key))?;
        pretty_kv(w, "Model", &record.board_model)?;
        pretty_kv(w, "Summary", &record.repair_summary)?;
        for event in &record.events {
            writeln!(w, "  {}", event_line(event))?;
        }
        writeln!(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_drop_leading_zero_units() {
        assert_eq!(format_span(TimeDelta::minutes(5)), "5m");
        assert_eq!(format_span(TimeDelta::minutes(125)), "2h 5m");
        assert_eq!(format_span(TimeDelta::hours(26)), "1d 2h 0m");
        assert_eq!(format_span(TimeDelta::minutes(-3)), "0m");
    }
}
