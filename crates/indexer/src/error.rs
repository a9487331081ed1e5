use crate::document::ParseError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed plan: {0}")]
    MalformedPlan(#[from] terraform_plan::MalformedPlanError),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Cannot locate index for {}", .0.display())]
    UnresolvedIdentity(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Watcher error: {0}")]
    WatcherError(#[from] notify::Error),

    #[error("{0}")]
    Other(String),
}
