//! Error types for solver operations.

use std::fmt;

use thiserror::Error;
use wf_aml::AmlError;

/// Why a Newton solve stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SingularJacobian,
    NonFinite,
    Diverged,
    MaxIterationsExceeded,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::SingularJacobian => "singular Jacobian",
            FailureKind::NonFinite => "non-finite value",
            FailureKind::Diverged => "line search failed",
            FailureKind::MaxIterationsExceeded => "maximum iterations exceeded",
        };
        f.write_str(s)
    }
}

/// Diagnostic state of a failed solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFailure {
    pub kind: FailureKind,
    pub iterations: usize,
    /// 2-norm of the residual at the last committed iterate
    pub residual_norm: f64,
    /// Constraint with the largest residual, when identifiable
    pub worst_constraint: Option<String>,
}

impl fmt::Display for NumericFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} iterations (residual norm {:.3e}",
            self.kind, self.iterations, self.residual_norm
        )?;
        if let Some(c) = &self.worst_constraint {
            write!(f, ", worst constraint {c}")?;
        }
        f.write_str(")")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Numeric failure: {0}")]
    Numeric(NumericFailure),

    #[error("Model error: {0}")]
    Model(#[from] AmlError),

    #[error("System is not square: {rows} constraints, {cols} variables")]
    NotSquare { rows: usize, cols: usize },

    #[error("Invalid solver configuration: {what}")]
    InvalidConfig { what: &'static str },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// Numeric failures can be retried with a different start or tolerance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SolverError::Numeric(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_constraint() {
        let err = SolverError::Numeric(NumericFailure {
            kind: FailureKind::Diverged,
            iterations: 7,
            residual_norm: 0.5,
            worst_constraint: Some("balance[J1]".into()),
        });
        let text = err.to_string();
        assert!(text.contains("balance[J1]"));
        assert!(text.contains("7 iterations"));
        assert!(err.is_retryable());
    }
}
