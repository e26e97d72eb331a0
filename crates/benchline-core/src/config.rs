use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub states: StateConfig,
    #[serde(default)]
    pub prune: PruneConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub repairs: RepairConfig,
}

/// Business rules for turning raw tracker states into cohorts.
///
/// Kept as data so a rule change is a config edit rather than a code edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Raw state → canonical cohort label. Applied to primary units before
    /// insertion; these states are not valid end-of-day snapshots.
    #[serde(default = "default_relabel")]
    pub relabel: BTreeMap<String, String>,
    /// State meaning a unit is finished; drives closure and pruning.
    #[serde(default = "default_terminal_label")]
    pub terminal_label: String,
    /// Raw states counted in "Total Processed".
    #[serde(default = "default_processed_labels")]
    pub processed_labels: BTreeSet<String>,
    /// Secondary-unit raw state → cohort label. Other secondary states are
    /// counted only in "Total Chassis".
    #[serde(default = "default_secondary_cohorts")]
    pub secondary_cohorts: BTreeMap<String, String>,
    /// State assumed for primary units between creation and their first
    /// transition. Unset means no state is asserted.
    #[serde(default)]
    pub floor_state: Option<String>,
    /// Cohorts that together must account for every unit on the
    /// terminal-count day.
    #[serde(default = "default_outcome_labels")]
    pub outcome_labels: Vec<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            relabel: default_relabel(),
            terminal_label: default_terminal_label(),
            processed_labels: default_processed_labels(),
            secondary_cohorts: default_secondary_cohorts(),
            floor_state: None,
            outcome_labels: default_outcome_labels(),
        }
    }
}

impl StateConfig {
    /// Canonical label for a raw primary-unit state.
    #[must_use]
    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.relabel.get(raw).map_or(raw, String::as_str)
    }

    #[must_use]
    pub fn is_processed(&self, raw: &str) -> bool {
        self.processed_labels.contains(raw)
    }

    /// Cohort label for a raw secondary-unit state, if it is tracked.
    #[must_use]
    pub fn secondary_cohort(&self, raw: &str) -> Option<&str> {
        self.secondary_cohorts.get(raw).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    /// Set to false to always emit the full table.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum "Total Boards" size that marks the start of real activity.
    #[serde(default = "default_min_units")]
    pub min_units: usize,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            min_units: default_min_units(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Non-working weekdays excluded from business-day counts.
    #[serde(default)]
    pub holidays: BTreeSet<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// States a unit must have reached to appear in the repair view.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<String>,
    /// States that remove a unit from the repair view.
    #[serde(default = "default_disqualifying")]
    pub disqualifying: Vec<String>,
    /// Comments mentioning these suffixes are attachment noise.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            milestones: default_milestones(),
            disqualifying: default_disqualifying(),
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Default dataset directory when `--data-dir` is not given.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.benchline/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".benchline/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("benchline/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project and user config and resolve the output mode.
///
/// # Errors
///
/// Propagates config read/parse failures.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

const fn default_min_units() -> usize {
    5
}

fn default_relabel() -> BTreeMap<String, String> {
    [
        ("Advanced Repair", "Awaiting Advanced Repair"),
        ("Backlog", "Awaiting Advanced Repair"),
    ]
    .into_iter()
    .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
    .collect()
}

fn default_terminal_label() -> String {
    "Done".to_string()
}

fn default_processed_labels() -> BTreeSet<String> {
    ["Done", "Scrap"].into_iter().map(String::from).collect()
}

fn default_secondary_cohorts() -> BTreeMap<String, String> {
    [("Done".to_string(), "Chassis Ready".to_string())]
        .into_iter()
        .collect()
}

fn default_outcome_labels() -> Vec<String> {
    [
        "Done",
        "Scrap",
        "Awaiting Advanced Repair",
        "Awaiting Functional Test",
        "Passed Initial Diagnosis",
        "Hashboard Replacement Program",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_milestones() -> Vec<String> {
    vec![
        "Advanced Repair".to_string(),
        "Awaiting Functional Test".to_string(),
    ]
}

fn default_disqualifying() -> Vec<String> {
    vec!["Scrap".to_string()]
}

fn default_image_extensions() -> Vec<String> {
    [".png", ".jpeg", ".jpg"].into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.states.terminal_label, "Done");
        assert_eq!(cfg.states.canonical("Backlog"), "Awaiting Advanced Repair");
        assert_eq!(cfg.states.canonical("Scrap"), "Scrap");
        assert!(cfg.states.is_processed("Scrap"));
        assert!(cfg.states.floor_state.is_none());
        assert!(cfg.prune.enabled);
        assert_eq!(cfg.prune.min_units, 5);
        assert!(cfg.calendar.holidays.is_empty());
        assert_eq!(cfg.repairs.disqualifying, vec!["Scrap".to_string()]);
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        std::fs::create_dir_all(root.path().join(".benchline")).expect("create config dir");
        std::fs::write(
            root.path().join(".benchline/config.toml"),
            r#"
[states]
floor_state = "Backlog"

[states.secondary_cohorts]
"Ready To Ship" = "Chassis Ready"

[prune]
min_units = 2

[calendar]
holidays = ["2025-12-25", "2026-01-01"]
"#,
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.states.floor_state.as_deref(), Some("Backlog"));
        assert_eq!(cfg.states.secondary_cohort("Ready To Ship"), Some("Chassis Ready"));
        assert_eq!(cfg.states.secondary_cohort("Done"), None);
        assert_eq!(cfg.states.terminal_label, "Done");
        assert_eq!(cfg.prune.min_units, 2);
        assert!(cfg.prune.enabled);
        assert_eq!(cfg.calendar.holidays.len(), 2);
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        std::fs::create_dir_all(root.path().join(".benchline")).expect("create config dir");
        std::fs::write(root.path().join(".benchline/config.toml"), "[prune\nmin_units = ")
            .expect("write config");
        assert!(load_project_config(root.path()).is_err());
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn env_wins_over_user_config() {
        let output = resolve_output(false, Some("json".to_string()), Some("table".to_string()));
        assert_eq!(output, "text");
    }
}
