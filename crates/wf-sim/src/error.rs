//! Error types for simulation operations.

use thiserror::Error;
use wf_controls::ControlError;
use wf_hydraulics::HydraulicsError;
use wf_network::NetworkError;
use wf_results::ResultsError;
use wf_solver::SolverError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Simulation is {state}; no further steps can be taken")]
    Finished { state: &'static str },

    /// Every attempt allowed by the retry policy failed.
    #[error("Step at t = {time_s} s failed after {attempts} attempt(s): {cause}")]
    StepFailed {
        time_s: f64,
        attempts: usize,
        #[source]
        cause: SolverError,
    },

    #[error("Step limit of {max_steps} reached before the end of the simulation")]
    MaxStepsExceeded { max_steps: usize },

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Hydraulics error: {0}")]
    Hydraulics(#[from] HydraulicsError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),
}

pub type SimResult<T> = Result<T, SimError>;
