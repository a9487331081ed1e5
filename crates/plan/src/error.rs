use thiserror::Error;

/// Reasons a plan buffer could not be decoded.
///
/// Plan files are frequently observed while a producer is still writing them, so every variant
/// is an ordinary recoverable error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedPlanError {
    #[error("plan buffer is empty")]
    Empty,

    #[error("unrecognized plan format: {0}")]
    UnrecognizedFormat(String),

    #[error("plan is truncated (line {line}, column {column})")]
    Truncated { line: usize, column: usize },

    #[error("plan is not valid JSON: {0}")]
    Syntax(String),

    #[error("plan does not match the expected schema: {0}")]
    Schema(String),

    #[error("unsupported plan format version {0}")]
    UnsupportedVersion(String),
}
