//! Extended-period simulation driver for water networks.
//!
//! Provides:
//! - The timestep loop: controls, equation refresh, Newton solve, status
//!   checks, tank integration and result recording
//! - A bounded retry policy for failed solves
//! - Result sinks (in-memory table, JSON-lines file)
//! - Parallel ensembles of independent scenarios

pub mod ensemble;
pub mod error;
pub mod options;
pub mod sim;
pub mod sink;

mod tanks;

pub use ensemble::{Scenario, ScenarioOutcome, run_ensemble};
pub use error::{SimError, SimResult};
pub use options::{RetryPolicy, SimOptions};
pub use sim::{SimState, Simulator};
pub use sink::ResultSink;
