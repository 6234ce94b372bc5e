//! Node elements: junctions, tanks and reservoirs.

use wf_core::{NodeId, PatternId};

use crate::attribute::NodeAttribute;

/// Emitter-style leak at a node: `q = cd * area * sqrt(2 g p)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leak {
    /// Hole area (m²)
    pub area: f64,
    /// Discharge coefficient
    pub discharge_coeff: f64,
}

/// Demand node with no storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    /// Base demand (m³/s) before pattern multiplication
    pub base_demand: f64,
    pub demand_pattern: Option<PatternId>,
    pub leak: Option<Leak>,
}

/// Cylindrical storage tank whose level is integrated between solves.
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub init_level: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub diameter: f64,
    /// Current level above the tank bottom (m)
    pub level: f64,
    pub leak: Option<Leak>,
}

impl Tank {
    /// Cross-sectional area (m²).
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.diameter / 4.0
    }

    /// Stored volume at the current level (m³).
    pub fn volume(&self) -> f64 {
        self.area() * self.level
    }

    pub fn is_full(&self) -> bool {
        self.level >= self.max_level
    }

    pub fn is_empty(&self) -> bool {
        self.level <= self.min_level
    }
}

/// Tank geometry passed to the builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankSpec {
    pub elevation: f64,
    pub init_level: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub diameter: f64,
}

/// Infinite source with a fixed (optionally patterned) head.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir {
    pub base_head: f64,
    pub head_pattern: Option<PatternId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Junction(Junction),
    Tank(Tank),
    Reservoir(Reservoir),
}

/// Hydraulic state written back after each converged solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeState {
    pub head: f64,
    pub pressure: f64,
    /// Delivered consumer demand (m³/s)
    pub demand: f64,
    /// Leak outflow (m³/s)
    pub leak_demand: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub elevation: f64,
    pub kind: NodeKind,
    pub state: NodeState,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, elevation: f64, kind: NodeKind) -> Self {
        let head = match &kind {
            NodeKind::Junction(_) => elevation,
            NodeKind::Tank(t) => elevation + t.init_level,
            NodeKind::Reservoir(r) => r.base_head,
        };
        Self {
            id,
            name,
            elevation,
            kind,
            state: NodeState {
                head,
                pressure: head - elevation,
                demand: 0.0,
                leak_demand: 0.0,
            },
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Junction(_) => "junction",
            NodeKind::Tank(_) => "tank",
            NodeKind::Reservoir(_) => "reservoir",
        }
    }

    /// Tanks and reservoirs fix the head during a solve.
    pub fn has_fixed_head(&self) -> bool {
        matches!(self.kind, NodeKind::Tank(_) | NodeKind::Reservoir(_))
    }

    pub fn as_junction(&self) -> Option<&Junction> {
        match &self.kind {
            NodeKind::Junction(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_tank(&self) -> Option<&Tank> {
        match &self.kind {
            NodeKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tank_mut(&mut self) -> Option<&mut Tank> {
        match &mut self.kind {
            NodeKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    pub fn leak(&self) -> Option<Leak> {
        match &self.kind {
            NodeKind::Junction(j) => j.leak,
            NodeKind::Tank(t) => t.leak,
            NodeKind::Reservoir(_) => None,
        }
    }

    /// Read a node attribute; `None` when the attribute does not apply.
    pub fn attribute(&self, attr: NodeAttribute) -> Option<f64> {
        match attr {
            NodeAttribute::Head => Some(self.state.head),
            NodeAttribute::Pressure => Some(self.state.pressure),
            NodeAttribute::Demand => Some(self.state.demand),
            NodeAttribute::Level => self.as_tank().map(|t| t.level),
        }
    }

    /// Move the tank level and keep head/pressure consistent with it.
    pub(crate) fn set_tank_level(&mut self, level: f64) {
        let elevation = self.elevation;
        if let NodeKind::Tank(tank) = &mut self.kind {
            tank.level = level;
            self.state.head = elevation + level;
            self.state.pressure = level;
        }
    }
}
