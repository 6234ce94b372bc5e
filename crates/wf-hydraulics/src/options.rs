//! Hydraulic modeling options.

use serde::{Deserialize, Serialize};

use crate::error::{HydraulicsError, HydraulicsResult};

/// How junction demand is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandModel {
    /// Demand is an input, delivered regardless of pressure.
    #[default]
    DemandDriven,
    /// Delivered demand falls off below the required pressure.
    PressureDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadlossModel {
    /// Roughness is the C factor.
    #[default]
    HazenWilliams,
    /// Roughness is absolute wall roughness in metres.
    DarcyWeisbach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraulicOptions {
    pub demand_model: DemandModel,
    pub headloss: HeadlossModel,
    /// Pressure (m) at or below which no demand is delivered
    pub minimum_pressure: f64,
    /// Pressure (m) at which the full demand is delivered
    pub required_pressure: f64,
    /// Exponent of the pressure-demand relation
    pub pressure_exponent: f64,
    /// Kinematic viscosity (m²/s) for Darcy-Weisbach
    pub viscosity: f64,
    /// Maximum status-check re-solves per step
    pub max_status_checks: usize,
}

impl Default for HydraulicOptions {
    fn default() -> Self {
        Self {
            demand_model: DemandModel::DemandDriven,
            headloss: HeadlossModel::HazenWilliams,
            minimum_pressure: 0.0,
            required_pressure: 20.0,
            pressure_exponent: 0.5,
            viscosity: 1.0e-6,
            max_status_checks: 10,
        }
    }
}

impl HydraulicOptions {
    pub fn validate(&self) -> HydraulicsResult<()> {
        if !(self.minimum_pressure.is_finite() && self.required_pressure.is_finite()) {
            return Err(HydraulicsError::InvalidOption {
                what: "pressure thresholds must be finite",
            });
        }
        if self.required_pressure <= self.minimum_pressure {
            return Err(HydraulicsError::InvalidOption {
                what: "required pressure must exceed minimum pressure",
            });
        }
        if !(self.pressure_exponent > 0.0) {
            return Err(HydraulicsError::InvalidOption {
                what: "pressure exponent must be positive",
            });
        }
        if !(self.viscosity > 0.0) {
            return Err(HydraulicsError::InvalidOption {
                what: "viscosity must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        HydraulicOptions::default().validate().unwrap();
    }

    #[test]
    fn inverted_pressure_band_is_rejected() {
        let opts = HydraulicOptions {
            minimum_pressure: 10.0,
            required_pressure: 5.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
