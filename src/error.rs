//! Exit codes and structured error output.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: success
/// - 1: unexpected failure
/// - 2: completed, no duplicates found
/// - 3: completed, some items skipped or failed
/// - 4: batch aborted because the operation log could not be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Grouping found nothing to do.
    NoDuplicates = 2,
    /// Completed, but some items were skipped or failed.
    PartialSuccess = 3,
    /// A mutation batch stopped because its log append failed.
    BatchAborted = 4,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DT000",
            Self::GeneralError => "DT001",
            Self::NoDuplicates => "DT002",
            Self::PartialSuccess => "DT003",
            Self::BatchAborted => "DT004",
        }
    }

    /// Exit code for a finished batch: partial when anything was skipped or failed.
    #[must_use]
    pub fn for_outcome(skipped: usize, failed: usize) -> Self {
        if skipped + failed > 0 {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}

/// Error record printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code such as `"DT001"`
    pub code: String,
    /// Numeric exit code
    pub exit_code: i32,
    /// Top-level message
    pub message: String,
    /// Underlying causes, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl StructuredError {
    /// Build from an application error and the exit code it maps to.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}
