//! Closed sets of element attributes readable by conditions.

use serde::{Deserialize, Serialize};

/// Node quantity a condition can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttribute {
    /// Total hydraulic head (m).
    Head,
    /// Pressure head above elevation (m).
    Pressure,
    /// Water level above tank bottom (m); tanks only.
    Level,
    /// Delivered demand (m³/s).
    Demand,
}

impl NodeAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeAttribute::Head => "head",
            NodeAttribute::Pressure => "pressure",
            NodeAttribute::Level => "level",
            NodeAttribute::Demand => "demand",
        }
    }
}

/// Link quantity a condition can read or an action can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAttribute {
    /// Volumetric flow (m³/s), positive from start to end node.
    Flow,
    /// Mean velocity (m/s); pipes and valves only.
    Velocity,
    /// Status as a number: 0 closed, 1 open, 2 active.
    Status,
    /// Pump speed or valve setting.
    Setting,
}

impl LinkAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkAttribute::Flow => "flow",
            LinkAttribute::Velocity => "velocity",
            LinkAttribute::Status => "status",
            LinkAttribute::Setting => "setting",
        }
    }
}
