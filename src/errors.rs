use std::path::PathBuf;
use thiserror::Error;

/// Problems detected while validating configuration, before any traversal starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name} pattern `{pattern}`: {source}")]
    InvalidPattern { name: &'static str, pattern: String, source: regex::Error },
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
    #[error("Invalid file level: {0}")]
    InvalidFileLevel(String),
    #[error("Invalid scan rule: {0}")]
    InvalidScanRule(String),
    #[error("n_percent must be within (0, 1], got {0}")]
    InvalidPercent(f64),
    #[error("weighting scale must be finite, got {0}")]
    InvalidScale(f64),
    #[error("Unknown weight policy: {0}")]
    InvalidWeightPolicy(String),
    #[error("Missing input: {0}")]
    MissingInput(&'static str),
    #[error("Invalid config file {path}: {message}")]
    Toml { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum SrcTagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("CSV error at line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("Index error: {0}")]
    Index(String),
}

impl From<serde_json::Error> for SrcTagError {
    fn from(e: serde_json::Error) -> Self {
        SrcTagError::Json(e.to_string())
    }
}
