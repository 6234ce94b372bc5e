//! wf-results: per-step hydraulic results and JSON-lines storage.

pub mod store;
pub mod table;
pub mod types;

pub use store::{JsonlStore, JsonlWriter};
pub use table::{ResultsTable, RunSummary};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed record on line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Results file not found: {path}")]
    NotFound { path: String },
}
