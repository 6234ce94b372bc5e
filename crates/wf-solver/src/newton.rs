//! Damped Newton solver with backtracking line search.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wf_aml::{AmlError, Model};
use wf_core::{first_non_finite, max_abs};

use crate::error::{FailureKind, NumericFailure, SolverError, SolverResult};
use crate::linear::solve_linear;

/// Newton solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    /// Converged when max |r| falls below this
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Smallest line-search step scale tried before giving up
    pub min_step: f64,
    /// Step scale reduction per backtrack
    pub backtrack: f64,
    /// Sufficient-decrease constant on `0.5 |r|²`
    pub armijo: f64,
    /// Number of non-decreasing full steps accepted when the line search fails
    pub max_non_decreasing: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            min_step: 1e-4,
            backtrack: 0.5,
            armijo: 1e-4,
            max_non_decreasing: 0,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> SolverResult<()> {
        if !(self.tolerance > 0.0) {
            return Err(SolverError::InvalidConfig {
                what: "tolerance must be positive",
            });
        }
        if !(self.backtrack > 0.0 && self.backtrack < 1.0) {
            return Err(SolverError::InvalidConfig {
                what: "backtrack factor must be in (0, 1)",
            });
        }
        if !(self.min_step > 0.0 && self.min_step <= 1.0) {
            return Err(SolverError::InvalidConfig {
                what: "minimum step must be in (0, 1]",
            });
        }
        if !(self.armijo >= 0.0 && self.armijo < 0.5) {
            return Err(SolverError::InvalidConfig {
                what: "armijo constant must be in [0, 0.5)",
            });
        }
        Ok(())
    }

    /// Looser tolerance and a doubled iteration cap, for retries.
    pub fn relaxed(&self, factor: f64) -> Self {
        Self {
            tolerance: self.tolerance * factor,
            max_iterations: self.max_iterations * 2,
            ..self.clone()
        }
    }
}

/// Outcome of a converged solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonReport {
    pub iterations: usize,
    /// 2-norm of the final residual
    pub residual_norm: f64,
    /// max |r| of the final residual
    pub max_residual: f64,
    /// Residual 2-norm of every committed iterate, starting point included
    pub residual_history: Vec<f64>,
}

struct Iterate {
    x: DVector<f64>,
    r: DVector<f64>,
    norm: f64,
}

fn worst_constraint(model: &Model, r: &DVector<f64>) -> Option<String> {
    if r.is_empty() {
        return None;
    }
    let row = r.iamax();
    model.constraint_name(row).map(str::to_string)
}

fn failure(
    model: &Model,
    kind: FailureKind,
    iterations: usize,
    current: &Iterate,
) -> SolverError {
    SolverError::Numeric(NumericFailure {
        kind,
        iterations,
        residual_norm: current.norm,
        worst_constraint: worst_constraint(model, &current.r),
    })
}

/// Evaluate residuals, mapping non-finite values to `Ok(None)`.
fn try_residuals(model: &Model) -> SolverResult<Option<DVector<f64>>> {
    match model.evaluate_residuals() {
        Ok(r) => Ok(Some(r)),
        Err(AmlError::NonFinite { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Drive the model's residuals to zero.
///
/// On success the model holds the converged point. On failure it holds the
/// last committed iterate, and the error carries the iteration count,
/// residual norm and worst constraint.
pub fn newton_solve(model: &mut Model, config: &NewtonConfig) -> SolverResult<NewtonReport> {
    config.validate()?;
    let (rows, cols) = (model.num_constraints(), model.num_variables());
    if rows != cols {
        return Err(SolverError::NotSquare { rows, cols });
    }

    let x = model.get_variable_vector()?;
    let r = match model.evaluate_residuals() {
        Ok(r) => r,
        Err(AmlError::NonFinite { constraint, .. }) => {
            return Err(SolverError::Numeric(NumericFailure {
                kind: FailureKind::NonFinite,
                iterations: 0,
                residual_norm: f64::NAN,
                worst_constraint: Some(constraint),
            }));
        }
        Err(e) => return Err(e.into()),
    };
    let norm = r.norm();
    let mut current = Iterate { x, r, norm };
    let mut history = vec![norm];
    let mut non_decreasing = 0;

    for iter in 0..=config.max_iterations {
        let max_residual = max_abs(current.r.as_slice());
        if max_residual < config.tolerance {
            debug!(iterations = iter, residual = current.norm, "newton converged");
            return Ok(NewtonReport {
                iterations: iter,
                residual_norm: current.norm,
                max_residual,
                residual_history: history,
            });
        }
        if iter == config.max_iterations {
            return Err(failure(model, FailureKind::MaxIterationsExceeded, iter, &current));
        }

        let jac = match model.evaluate_jacobian() {
            Ok(j) => j,
            Err(AmlError::NonFinite { .. }) => {
                return Err(failure(model, FailureKind::NonFinite, iter, &current));
            }
            Err(e) => return Err(e.into()),
        };
        let Some(dx) = solve_linear(&jac, &(-&current.r)) else {
            return Err(failure(model, FailureKind::SingularJacobian, iter, &current));
        };
        if let Some(row) = first_non_finite(dx.as_slice()) {
            debug!(iteration = iter, row, "non-finite Newton direction");
            return Err(failure(model, FailureKind::NonFinite, iter, &current));
        }

        let mut alpha = 1.0;
        let mut accepted = None;
        let mut full_step = None;
        while alpha >= config.min_step {
            let x_trial = &current.x + alpha * &dx;
            model.set_variable_vector(&x_trial)?;
            if let Some(r_trial) = try_residuals(model)? {
                let n_trial = r_trial.norm();
                let bound = (1.0 - 2.0 * config.armijo * alpha) * current.norm * current.norm;
                if n_trial < current.norm && n_trial * n_trial <= bound {
                    accepted = Some(Iterate {
                        x: x_trial,
                        r: r_trial,
                        norm: n_trial,
                    });
                    break;
                }
                if alpha == 1.0 {
                    full_step = Some(Iterate {
                        x: x_trial,
                        r: r_trial,
                        norm: n_trial,
                    });
                }
            }
            alpha *= config.backtrack;
        }

        let next = match (accepted, full_step) {
            (Some(next), _) => next,
            (None, Some(step)) if non_decreasing < config.max_non_decreasing => {
                non_decreasing += 1;
                debug!(
                    iteration = iter,
                    residual = step.norm,
                    "accepting non-decreasing step"
                );
                model.set_variable_vector(&step.x)?;
                step
            }
            _ => {
                model.set_variable_vector(&current.x)?;
                return Err(failure(model, FailureKind::Diverged, iter, &current));
            }
        };

        debug!(
            iteration = iter + 1,
            alpha,
            residual = next.norm,
            "newton step"
        );
        history.push(next.norm);
        current = next;
    }

    // The loop returns on its last pass.
    Err(failure(
        model,
        FailureKind::MaxIterationsExceeded,
        config.max_iterations,
        &current,
    ))
}
