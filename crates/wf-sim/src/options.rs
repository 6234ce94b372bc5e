//! Simulation options.

use serde::{Deserialize, Serialize};
use wf_controls::ConflictPolicy;
use wf_hydraulics::HydraulicOptions;
use wf_solver::NewtonConfig;

use crate::error::{SimError, SimResult};

/// Attempts made before a step is declared failed.
///
/// Attempt 1 starts from the previous solution, attempt 2 from a cold
/// guess, and every later attempt also multiplies the tolerance by
/// `relax_factor` (compounding) with a doubled iteration cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub relax_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            relax_factor: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Simulated duration (s); 0 runs a single snapshot
    pub duration_s: f64,
    pub hydraulic_timestep_s: f64,
    /// Clock time of day at t = 0 (s after midnight)
    pub start_clock_s: f64,
    /// Safety limit on the number of steps
    pub max_steps: usize,
    pub hydraulics: HydraulicOptions,
    pub newton: NewtonConfig,
    pub retry: RetryPolicy,
    pub conflict_policy: ConflictPolicy,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            duration_s: 86_400.0,
            hydraulic_timestep_s: 3600.0,
            start_clock_s: 0.0,
            max_steps: 100_000,
            hydraulics: HydraulicOptions::default(),
            newton: NewtonConfig::default(),
            retry: RetryPolicy::default(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl SimOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.duration_s >= 0.0 && self.duration_s.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "duration must be non-negative",
            });
        }
        if !(self.hydraulic_timestep_s > 0.0) {
            return Err(SimError::InvalidArg {
                what: "hydraulic timestep must be positive",
            });
        }
        if !(self.start_clock_s >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "start clock must be non-negative",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(SimError::InvalidArg {
                what: "retry policy needs at least one attempt",
            });
        }
        if !(self.retry.relax_factor >= 1.0) {
            return Err(SimError::InvalidArg {
                what: "relax factor must be at least 1",
            });
        }
        self.hydraulics.validate()?;
        self.newton.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SimOptions::default().validate().unwrap();
    }

    #[test]
    fn zero_timestep_rejected() {
        let opts = SimOptions {
            hydraulic_timestep_s: 0.0,
            ..SimOptions::default()
        };
        assert!(matches!(opts.validate(), Err(SimError::InvalidArg { .. })));
    }

    #[test]
    fn zero_attempts_rejected() {
        let opts = SimOptions {
            retry: RetryPolicy {
                max_attempts: 0,
                ..RetryPolicy::default()
            },
            ..SimOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
