//! `bl batches`: list known batches with their closure state.

use std::io::{self, Write};

use benchline_core::summary::{ClosedState, closed_state};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;

use super::{Context, closed_label};
use crate::output::{Renderable, pretty_kv, pretty_rule, render_list};

/// Arguments for `bl batches`.
#[derive(Args, Debug, Default)]
pub struct BatchesArgs {
    /// Include batches on the skip-list.
    #[arg(long)]
    pub all: bool,
}

/// One row of the batch listing.
#[derive(Debug, Serialize)]
pub struct BatchListing {
    pub key: String,
    pub title: String,
    pub anchor_date: NaiveDate,
    pub unit_count: usize,
    pub secondary_unit_count: usize,
    pub closed_state: ClosedState,
    pub skipped: bool,
}

impl Renderable for BatchListing {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}  {}", self.key, self.title)?;
        pretty_rule(w)?;
        pretty_kv(w, "Anchor", self.anchor_date.to_string())?;
        pretty_kv(
            w,
            "Units",
            format!("{} boards, {} chassis", self.unit_count, self.secondary_unit_count),
        )?;
        pretty_kv(w, "State", closed_label(self.closed_state))?;
        if self.skipped {
            pretty_kv(w, "Skip-list", "yes")?;
        }
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            self.key,
            self.anchor_date,
            self.unit_count,
            closed_label(self.closed_state),
            self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["KEY", "ANCHOR", "UNITS", "STATE", "TITLE"]
    }
}

/// Execute `bl batches`.
pub fn run_batches(args: &BatchesArgs, ctx: &Context) -> anyhow::Result<()> {
    let skip = ctx.skip_list()?;
    let metas = ctx.check(ctx.dataset.batch_metas())?;

    let mut rows = Vec::with_capacity(metas.len());
    for meta in metas {
        let skipped = skip.contains(&meta.key);
        if skipped && !args.all {
            continue;
        }
        let batch = ctx.check(ctx.dataset.load_batch(&meta))?;
        rows.push(BatchListing {
            closed_state: closed_state(&batch, &ctx.config.states.terminal_label),
            unit_count: batch.primary.len(),
            secondary_unit_count: batch.secondary.len(),
            key: batch.key,
            title: batch.title,
            anchor_date: batch.anchor,
            skipped,
        });
    }

    render_list(&rows, ctx.output)
}
