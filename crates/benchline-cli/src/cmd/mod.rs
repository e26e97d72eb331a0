pub mod batches;
pub mod completions;
pub mod repairs;
pub mod summary;
pub mod timeline;

use std::path::Path;

use benchline_core::config::ProjectConfig;
use benchline_core::dataset::{Dataset, DatasetError, SkipList};
use benchline_core::model::Batch;
use benchline_core::summary::ClosedState;
use tracing::warn;

use crate::output::{CliError, OutputMode, render_error};

/// Shared state for commands that read a dataset.
pub struct Context {
    pub dataset: Dataset,
    pub config: ProjectConfig,
    pub output: OutputMode,
    pub quiet: bool,
}

impl Context {
    /// Open the dataset at `data_dir`, rendering a coded error on failure.
    pub fn open(
        data_dir: &Path,
        config: ProjectConfig,
        output: OutputMode,
        quiet: bool,
    ) -> anyhow::Result<Self> {
        let dataset = Dataset::open(data_dir).map_err(|err| fail(output, &CliError::from(&err)))?;
        Ok(Self {
            dataset,
            config,
            output,
            quiet,
        })
    }

    /// Render a dataset failure and convert it for `?`.
    pub fn check<T>(&self, result: Result<T, DatasetError>) -> anyhow::Result<T> {
        result.map_err(|err| fail(self.output, &CliError::from(&err)))
    }

    /// Resolve `key` (exact or numeric suffix) and load its units.
    pub fn load_batch(&self, key: &str) -> anyhow::Result<Batch> {
        let meta = self.check(self.dataset.find_meta(key))?;
        self.check(self.dataset.load_batch(&meta))
    }

    pub fn skip_list(&self) -> anyhow::Result<SkipList> {
        self.check(self.dataset.skip_list())
    }

    /// Add `key` to the skip-list after the engine found no usable data.
    pub fn exclude(&self, skip: &mut SkipList, key: &str) -> anyhow::Result<()> {
        if !skip.insert(key) {
            return Ok(());
        }
        self.check(skip.save())?;
        warn!(batch = key, "batch has no usable data; added to skip-list");
        if !self.quiet && !self.output.is_json() {
            eprintln!("note: {key} added to skip-list");
        }
        Ok(())
    }
}

/// Render `error` to stderr and turn it into the command's failure.
pub fn fail(output: OutputMode, error: &CliError) -> anyhow::Error {
    if let Err(render_err) = render_error(output, error) {
        return render_err;
    }
    anyhow::anyhow!("{}", error.message)
}

/// Short closure label for human output.
pub const fn closed_label(state: ClosedState) -> &'static str {
    match state {
        ClosedState::Open => "open",
        ClosedState::Closed => "closed",
        ClosedState::Undetermined => "-",
    }
}
