use std::fmt;

/// Machine-readable error codes for scripts and dashboards consuming `bl` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DataDirMissing,
    ConfigParseError,
    DatasetParseError,
    BatchNotFound,
    MissingCreationDate,
    NoBatchData,
    CohortAccountingMismatch,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DataDirMissing => "E1001",
            Self::ConfigParseError => "E1002",
            Self::DatasetParseError => "E1003",
            Self::BatchNotFound => "E2001",
            Self::MissingCreationDate => "E3001",
            Self::NoBatchData => "E3002",
            Self::CohortAccountingMismatch => "E3003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::DataDirMissing => "Data directory not found",
            Self::ConfigParseError => "Config file parse error",
            Self::DatasetParseError => "Dataset file parse error",
            Self::BatchNotFound => "Batch not found",
            Self::MissingCreationDate => "Unit has no usable creation date",
            Self::NoBatchData => "Batch has no resolvable timeline",
            Self::CohortAccountingMismatch => "Terminal cohorts do not cover every unit",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::DataDirMissing => {
                Some("Pass --data-dir or set data_dir in ~/.config/benchline/config.toml.")
            }
            Self::ConfigParseError => Some("Fix syntax in .benchline/config.toml and retry."),
            Self::DatasetParseError => Some("Re-export the batch records from the tracker."),
            Self::BatchNotFound => Some("Run `bl batches` to list known batch keys."),
            Self::MissingCreationDate => {
                Some("The unit is excluded; fix its creation timestamp in the tracker.")
            }
            Self::NoBatchData => {
                Some("The batch was added to the skip-list; remove it from skipped.json to retry.")
            }
            Self::CohortAccountingMismatch => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Recoverable engine failures.
///
/// Both variants are scoped: a missing creation date excludes one unit, no
/// batch data excludes one batch. Neither should stop sibling work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The unit carries no usable creation timestamp.
    #[error("unit {unit} has no usable creation date")]
    MissingCreationDate { unit: String },

    /// The batch has no unit with a resolvable timeline.
    #[error("batch {batch} has no resolvable day range")]
    NoBatchData { batch: String },
}

impl EngineError {
    /// The stable error code for this failure.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingCreationDate { .. } => ErrorCode::MissingCreationDate,
            Self::NoBatchData { .. } => ErrorCode::NoBatchData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::DataDirMissing,
            ErrorCode::ConfigParseError,
            ErrorCode::DatasetParseError,
            ErrorCode::BatchNotFound,
            ErrorCode::MissingCreationDate,
            ErrorCode::NoBatchData,
            ErrorCode::CohortAccountingMismatch,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::NoBatchData.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn engine_errors_map_to_codes() {
        let err = EngineError::NoBatchData {
            batch: "RT-100".into(),
        };
        assert_eq!(err.error_code(), ErrorCode::NoBatchData);
        assert_eq!(err.to_string(), "batch RT-100 has no resolvable day range");

        let err = EngineError::MissingCreationDate {
            unit: "RT-101".into(),
        };
        assert_eq!(err.error_code().code(), "E3001");
    }
}
