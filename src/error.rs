use thiserror::Error;

use crate::validate::ValidationError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{} invalid lot(s): {}", .0.len(), summarize(.0))]
    Validation(Vec<ValidationError>),

    #[error("No cost basis entry for token '{0}'")]
    UnknownToken(String),

    #[error("Lot index {index} out of range for token '{token_id}' ({len} lots)")]
    LotIndexOutOfRange {
        token_id: String,
        index: usize,
        len: usize,
    },

    #[error("Cannot sell {requested} of '{token_id}': only {available} held")]
    Oversell {
        token_id: String,
        requested: f64,
        available: f64,
    },

    #[error("Invalid accounting method '{0}'. Must be 'fifo', 'lifo', or 'average'.")]
    InvalidMethod(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, LedgerError>;
