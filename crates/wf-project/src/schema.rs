//! Scenario file schema.

use serde::{Deserialize, Serialize};
use wf_controls::{Control, Rule};
use wf_network::{LinkStatus, ValveKind};
use wf_sim::SimOptions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub options: SimOptions,
    /// Pattern step length (s); one hour when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_timestep_s: Option<f64>,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
    #[serde(default)]
    pub curves: Vec<CurveDef>,
    #[serde(default)]
    pub junctions: Vec<JunctionDef>,
    #[serde(default)]
    pub tanks: Vec<TankDef>,
    #[serde(default)]
    pub reservoirs: Vec<ReservoirDef>,
    #[serde(default)]
    pub pipes: Vec<PipeDef>,
    #[serde(default)]
    pub pumps: Vec<PumpDef>,
    #[serde(default)]
    pub valves: Vec<ValveDef>,
    #[serde(default)]
    pub controls: Vec<Control>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: crate::validate::LATEST_VERSION,
            name: name.into(),
            options: SimOptions::default(),
            pattern_timestep_s: None,
            patterns: Vec::new(),
            curves: Vec::new(),
            junctions: Vec::new(),
            tanks: Vec::new(),
            reservoirs: Vec::new(),
            pipes: Vec::new(),
            pumps: Vec::new(),
            valves: Vec::new(),
            controls: Vec::new(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternDef {
    pub name: String,
    pub multipliers: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurveDef {
    pub name: String,
    /// `[flow m³/s, head m]` pairs
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeakDef {
    pub area_m2: f64,
    #[serde(default = "default_discharge_coeff")]
    pub discharge_coeff: f64,
}

fn default_discharge_coeff() -> f64 {
    0.75
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JunctionDef {
    pub name: String,
    pub elevation_m: f64,
    #[serde(default)]
    pub demand_cms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leak: Option<LeakDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TankDef {
    pub name: String,
    pub elevation_m: f64,
    pub init_level_m: f64,
    #[serde(default)]
    pub min_level_m: f64,
    pub max_level_m: f64,
    pub diameter_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leak: Option<LeakDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservoirDef {
    pub name: String,
    pub head_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipeDef {
    pub name: String,
    pub from: String,
    pub to: String,
    pub length_m: f64,
    pub diameter_m: f64,
    /// Hazen-Williams C, or Darcy-Weisbach roughness height (m)
    pub roughness: f64,
    #[serde(default)]
    pub minor_loss: f64,
    #[serde(default)]
    pub check_valve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LinkStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PumpDef {
    pub name: String,
    pub from: String,
    pub to: String,
    /// Head curve name; exclusive with `power_kw`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LinkStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValveDef {
    pub name: String,
    pub from: String,
    pub to: String,
    pub kind: ValveKind,
    pub diameter_m: f64,
    pub setting: f64,
    #[serde(default)]
    pub minor_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LinkStatus>,
}
