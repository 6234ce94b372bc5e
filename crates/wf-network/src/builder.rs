//! Incremental network builder.

use uom::si::length::meter;
use uom::si::power::watt;
use uom::si::volume_rate::cubic_meter_per_second;
use wf_core::units::{Length, VolumeRate};
use wf_core::{CurveId, LinkId, NodeId, PatternId};

use crate::curve::{Curve, HeadCurveCoeffs};
use crate::error::{NetworkError, NetworkResult};
use crate::link::{Link, LinkKind, LinkStatus, Pipe, PipeSpec, Pump, PumpSpec, Valve, ValveSpec};
use crate::network::Network;
use crate::node::{Junction, Leak, Node, NodeKind, Reservoir, Tank, TankSpec};
use crate::pattern::Pattern;
use crate::validate;

/// Builder for constructing a network incrementally.
///
/// Element parameters are checked as they are added; network-wide checks
/// run in [`NetworkBuilder::build`].
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    network: Network,
}

fn positive(element: &str, what: &'static str, value: f64) -> NetworkResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(NetworkError::invalid(element, what, format!("{value} must be positive")))
    }
}

fn non_negative(element: &str, what: &'static str, value: f64) -> NetworkResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(NetworkError::invalid(element, what, format!("{value} must be non-negative")))
    }
}

fn finite(element: &str, what: &'static str, value: f64) -> NetworkResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NetworkError::invalid(element, what, "must be finite"))
    }
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pattern_timestep(&mut self, seconds: f64) -> NetworkResult<()> {
        self.network.set_pattern_timestep(seconds)
    }

    fn push_node(&mut self, name: String, elevation: f64, kind: NodeKind) -> NetworkResult<NodeId> {
        if self.network.node_names.contains_key(&name) {
            return Err(NetworkError::DuplicateName { kind: "node", name });
        }
        let id = NodeId::from_index(self.network.nodes.len() as u32);
        self.network.node_names.insert(name.clone(), id);
        self.network.nodes.push(Some(Node::new(id, name, elevation, kind)));
        self.network.adjacency.push(Vec::new());
        Ok(id)
    }

    fn push_link(
        &mut self,
        name: String,
        start: NodeId,
        end: NodeId,
        kind: LinkKind,
        setting: f64,
    ) -> NetworkResult<LinkId> {
        if self.network.link_names.contains_key(&name) {
            return Err(NetworkError::DuplicateName { kind: "link", name });
        }
        self.network.try_node(start)?;
        let end_name = self.network.try_node(end)?.name.clone();
        if start == end {
            return Err(NetworkError::SelfLoop { link: name, node: end_name });
        }
        let id = LinkId::from_index(self.network.links.len() as u32);
        self.network.link_names.insert(name.clone(), id);
        self.network
            .links
            .push(Some(Link::new(id, name, start, end, kind, setting)));
        self.network.adjacency[start.slot()].push(id);
        self.network.adjacency[end.slot()].push(id);
        Ok(id)
    }

    /// Add a demand junction.
    pub fn add_junction(
        &mut self,
        name: impl Into<String>,
        elevation: Length,
        base_demand: VolumeRate,
    ) -> NetworkResult<NodeId> {
        let name = name.into();
        let elevation = finite(&name, "elevation", elevation.get::<meter>())?;
        let base_demand = finite(
            &name,
            "base demand",
            base_demand.get::<cubic_meter_per_second>(),
        )?;
        self.push_node(
            name,
            elevation,
            NodeKind::Junction(Junction {
                base_demand,
                demand_pattern: None,
                leak: None,
            }),
        )
    }

    /// Add a cylindrical tank starting at `spec.init_level`.
    pub fn add_tank(&mut self, name: impl Into<String>, spec: TankSpec) -> NetworkResult<NodeId> {
        let name = name.into();
        finite(&name, "elevation", spec.elevation)?;
        positive(&name, "diameter", spec.diameter)?;
        non_negative(&name, "min level", spec.min_level)?;
        if !(spec.min_level <= spec.init_level && spec.init_level <= spec.max_level) {
            return Err(NetworkError::invalid(
                &name,
                "levels",
                "require min <= init <= max",
            ));
        }
        self.push_node(
            name,
            spec.elevation,
            NodeKind::Tank(Tank {
                init_level: spec.init_level,
                min_level: spec.min_level,
                max_level: spec.max_level,
                diameter: spec.diameter,
                level: spec.init_level,
                leak: None,
            }),
        )
    }

    /// Add a fixed-head reservoir. Its elevation equals its base head.
    pub fn add_reservoir(&mut self, name: impl Into<String>, head: Length) -> NetworkResult<NodeId> {
        let name = name.into();
        let head = finite(&name, "head", head.get::<meter>())?;
        self.push_node(
            name,
            head,
            NodeKind::Reservoir(Reservoir {
                base_head: head,
                head_pattern: None,
            }),
        )
    }

    pub fn add_pattern(
        &mut self,
        name: impl Into<String>,
        multipliers: Vec<f64>,
    ) -> NetworkResult<PatternId> {
        let name = name.into();
        if self.network.pattern_names.contains_key(&name) {
            return Err(NetworkError::DuplicateName { kind: "pattern", name });
        }
        for m in &multipliers {
            non_negative(&name, "multiplier", *m)?;
        }
        let id = PatternId::from_index(self.network.patterns.len() as u32);
        self.network.pattern_names.insert(name.clone(), id);
        self.network.patterns.push(Pattern {
            id,
            name,
            multipliers,
        });
        Ok(id)
    }

    pub fn add_curve(
        &mut self,
        name: impl Into<String>,
        points: Vec<(f64, f64)>,
    ) -> NetworkResult<CurveId> {
        let name = name.into();
        if self.network.curve_names.contains_key(&name) {
            return Err(NetworkError::DuplicateName { kind: "curve", name });
        }
        if points.is_empty() || points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(NetworkError::InvalidCurve {
                curve: name,
                reason: "points must be finite and non-empty".into(),
            });
        }
        let id = CurveId::from_index(self.network.curves.len() as u32);
        self.network.curve_names.insert(name.clone(), id);
        self.network.curves.push(Curve { id, name, points });
        Ok(id)
    }

    pub fn add_pipe(
        &mut self,
        name: impl Into<String>,
        start: NodeId,
        end: NodeId,
        spec: PipeSpec,
    ) -> NetworkResult<LinkId> {
        let name = name.into();
        let pipe = Pipe {
            length: positive(&name, "length", spec.length.get::<meter>())?,
            diameter: positive(&name, "diameter", spec.diameter.get::<meter>())?,
            roughness: positive(&name, "roughness", spec.roughness)?,
            minor_loss: non_negative(&name, "minor loss", spec.minor_loss)?,
            check_valve: spec.check_valve,
        };
        self.push_link(name, start, end, LinkKind::Pipe(pipe), 0.0)
    }

    /// Add a pump; flow is positive from `start` (suction) to `end`.
    pub fn add_pump(
        &mut self,
        name: impl Into<String>,
        start: NodeId,
        end: NodeId,
        spec: PumpSpec,
    ) -> NetworkResult<LinkId> {
        let name = name.into();
        let pump = match spec {
            PumpSpec::HeadCurve(curve) => {
                let curve_ref = self.network.curve(curve).ok_or(NetworkError::UnknownId {
                    kind: "curve",
                    index: curve.index(),
                })?;
                Pump::HeadCurve {
                    curve,
                    coeffs: HeadCurveCoeffs::fit(curve_ref)?,
                }
            }
            PumpSpec::Power(power) => Pump::Power {
                power_w: positive(&name, "power", power.get::<watt>())?,
            },
        };
        self.push_link(name, start, end, LinkKind::Pump(pump), 1.0)
    }

    pub fn add_valve(
        &mut self,
        name: impl Into<String>,
        start: NodeId,
        end: NodeId,
        spec: ValveSpec,
    ) -> NetworkResult<LinkId> {
        let name = name.into();
        let valve = Valve {
            kind: spec.kind,
            diameter: positive(&name, "diameter", spec.diameter.get::<meter>())?,
            minor_loss: non_negative(&name, "minor loss", spec.minor_loss)?,
        };
        let setting = non_negative(&name, "setting", spec.setting)?;
        self.push_link(name, start, end, LinkKind::Valve(valve), setting)
    }

    fn junction_mut(&mut self, node: NodeId) -> NetworkResult<&mut Junction> {
        let node = self.network.node_mut(node).ok_or(NetworkError::UnknownId {
            kind: "node",
            index: node.index(),
        })?;
        match &mut node.kind {
            NodeKind::Junction(j) => Ok(j),
            _ => Err(NetworkError::UnsupportedAttribute {
                element: node.name.clone(),
                attribute: "demand pattern",
            }),
        }
    }

    fn check_pattern(&self, pattern: PatternId) -> NetworkResult<()> {
        self.network
            .pattern(pattern)
            .map(|_| ())
            .ok_or(NetworkError::UnknownId {
                kind: "pattern",
                index: pattern.index(),
            })
    }

    pub fn set_demand_pattern(&mut self, node: NodeId, pattern: PatternId) -> NetworkResult<()> {
        self.check_pattern(pattern)?;
        self.junction_mut(node)?.demand_pattern = Some(pattern);
        Ok(())
    }

    pub fn set_head_pattern(&mut self, node: NodeId, pattern: PatternId) -> NetworkResult<()> {
        self.check_pattern(pattern)?;
        let node = self.network.node_mut(node).ok_or(NetworkError::UnknownId {
            kind: "node",
            index: node.index(),
        })?;
        match &mut node.kind {
            NodeKind::Reservoir(r) => {
                r.head_pattern = Some(pattern);
                Ok(())
            }
            _ => Err(NetworkError::UnsupportedAttribute {
                element: node.name.clone(),
                attribute: "head pattern",
            }),
        }
    }

    /// Attach a leak to a junction or tank.
    pub fn set_leak(&mut self, node: NodeId, leak: Leak) -> NetworkResult<()> {
        let node = self.network.node_mut(node).ok_or(NetworkError::UnknownId {
            kind: "node",
            index: node.index(),
        })?;
        positive(&node.name, "leak area", leak.area)?;
        positive(&node.name, "leak discharge coefficient", leak.discharge_coeff)?;
        match &mut node.kind {
            NodeKind::Junction(j) => j.leak = Some(leak),
            NodeKind::Tank(t) => t.leak = Some(leak),
            NodeKind::Reservoir(_) => {
                return Err(NetworkError::UnsupportedAttribute {
                    element: node.name.clone(),
                    attribute: "leak",
                });
            }
        }
        Ok(())
    }

    pub fn set_initial_status(&mut self, link: LinkId, status: LinkStatus) -> NetworkResult<()> {
        self.network.set_link_status(link, status).map(|_| ())
    }

    pub fn set_initial_setting(&mut self, link: LinkId, value: f64) -> NetworkResult<()> {
        self.network.set_link_setting(link, value).map(|_| ())
    }

    /// Lookup for callers that resolve names while building.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.network.node_id(name)
    }

    pub fn link_id(&self, name: &str) -> Option<LinkId> {
        self.network.link_id(name)
    }

    pub fn pattern_id(&self, name: &str) -> Option<PatternId> {
        self.network.pattern_id(name)
    }

    pub fn curve_id(&self, name: &str) -> Option<CurveId> {
        self.network.curve_id(name)
    }

    /// Validate and return the network.
    pub fn build(mut self) -> NetworkResult<Network> {
        validate::validate_network(&self.network)?;
        self.network.reset_structure_version();
        Ok(self.network)
    }
}
