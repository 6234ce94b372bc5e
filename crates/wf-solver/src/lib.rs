//! wf-solver: damped Newton iteration over an algebraic model.
//!
//! The solver reads residuals and the sparse Jacobian from a
//! [`wf_aml::Model`], solves `J dx = -r`, and backtracks along `dx` until the
//! residual norm decreases. Committed iterates are written back into the
//! model, so on return the model holds the last accepted point.

pub mod error;
pub mod linear;
pub mod newton;

pub use error::{FailureKind, NumericFailure, SolverError, SolverResult};
pub use newton::{NewtonConfig, NewtonReport, newton_solve};
