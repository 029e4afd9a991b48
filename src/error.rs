//! Error types for Aadhaar Pulse

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading data or computing indicators
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Unknown dataset type: {0}")]
    UnknownDataset(String),

    #[error("Dataset directory not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Invalid period label: {0}")]
    InvalidPeriod(String),

    #[error("Invalid region key: {0}")]
    InvalidRegionKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Period {period} is not after last processed period {last}")]
    OutOfOrderPeriod { period: String, last: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
