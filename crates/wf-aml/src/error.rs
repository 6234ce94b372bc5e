//! Modeling-layer errors.

use thiserror::Error;

pub type AmlResult<T> = Result<T, AmlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmlError {
    #[error("Model structure is not finalized")]
    NotInitialized,

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Variable '{variable}' is still used by constraint '{constraint}'")]
    VariableInUse { variable: String, constraint: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Non-finite value {value} in constraint '{constraint}'")]
    NonFinite { constraint: String, value: f64 },
}
