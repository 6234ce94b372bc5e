//! wf-hydraulics: maps network state onto the algebraic model.
//!
//! Provides:
//! - Headloss laws (Hazen-Williams, Darcy-Weisbach with Swamee-Jain, minor losses)
//! - Demand models (demand-driven, pressure-driven with a smoothed Wagner curve)
//! - The equation builder ([`HydraulicModel`]) with parameter refresh and
//!   solution write-back
//! - Post-solve status checks for check valves, pumps, regulating valves and
//!   full or empty tanks

pub mod builder;
pub mod error;
pub mod headloss;
pub mod options;
pub mod smooth;
pub mod status;

pub use builder::HydraulicModel;
pub use error::{HydraulicsError, HydraulicsResult};
pub use options::{DemandModel, HeadlossModel, HydraulicOptions};
pub use status::{StatusChange, check_statuses};
