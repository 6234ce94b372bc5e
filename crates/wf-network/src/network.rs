//! The mutable network model shared by the equation builder, control engine
//! and timestep driver.

use std::collections::HashMap;

use wf_core::{CurveId, LinkId, NodeId, PatternId};

use crate::curve::Curve;
use crate::error::{NetworkError, NetworkResult};
use crate::link::{Link, LinkStatus};
use crate::node::{Node, NodeKind};
use crate::pattern::Pattern;

/// Default pattern timestep (s).
pub const DEFAULT_PATTERN_TIMESTEP: f64 = 3600.0;

/// Junctions, tanks, reservoirs and the links between them.
///
/// Element slots are tombstoned on removal so ids stay stable for the life
/// of the network. Names are unique per element family (nodes, links,
/// patterns, curves).
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) links: Vec<Option<Link>>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) curves: Vec<Curve>,
    pub(crate) node_names: HashMap<String, NodeId>,
    pub(crate) link_names: HashMap<String, LinkId>,
    pub(crate) pattern_names: HashMap<String, PatternId>,
    pub(crate) curve_names: HashMap<String, CurveId>,
    /// Incident links per node slot
    pub(crate) adjacency: Vec<Vec<LinkId>>,
    pub(crate) pattern_timestep_s: f64,
    structure_version: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            patterns: Vec::new(),
            curves: Vec::new(),
            node_names: HashMap::new(),
            link_names: HashMap::new(),
            pattern_names: HashMap::new(),
            curve_names: HashMap::new(),
            adjacency: Vec::new(),
            pattern_timestep_s: DEFAULT_PATTERN_TIMESTEP,
            structure_version: 0,
        }
    }
}

impl Network {
    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.link_names.len()
    }

    /// Upper bound on node slot indices, including removed nodes.
    pub fn node_slots(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_slots(&self) -> usize {
        self.links.len()
    }

    /// Counter bumped whenever a change alters the equation structure.
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    pub(crate) fn bump_structure(&mut self) {
        self.structure_version += 1;
    }

    pub(crate) fn reset_structure_version(&mut self) {
        self.structure_version = 0;
    }

    pub fn pattern_timestep(&self) -> f64 {
        self.pattern_timestep_s
    }

    pub fn set_pattern_timestep(&mut self, seconds: f64) -> NetworkResult<()> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(NetworkError::invalid(
                "network",
                "pattern timestep",
                "must be positive",
            ));
        }
        self.pattern_timestep_s = seconds;
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.slot()).and_then(Option::as_mut)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(id.slot()).and_then(Option::as_mut)
    }

    /// Like [`Network::node`] but reports a missing id as an error.
    pub fn try_node(&self, id: NodeId) -> NetworkResult<&Node> {
        self.node(id).ok_or(NetworkError::UnknownId {
            kind: "node",
            index: id.index(),
        })
    }

    pub fn try_link(&self, id: LinkId) -> NetworkResult<&Link> {
        self.link(id).ok_or(NetworkError::UnknownId {
            kind: "link",
            index: id.index(),
        })
    }

    fn try_link_mut(&mut self, id: LinkId) -> NetworkResult<&mut Link> {
        self.link_mut(id).ok_or(NetworkError::UnknownId {
            kind: "link",
            index: id.index(),
        })
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// Live links in id order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().flatten()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn link_id(&self, name: &str) -> Option<LinkId> {
        self.link_names.get(name).copied()
    }

    pub fn pattern_id(&self, name: &str) -> Option<PatternId> {
        self.pattern_names.get(name).copied()
    }

    pub fn curve_id(&self, name: &str) -> Option<CurveId> {
        self.curve_names.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node_id(name).and_then(|id| self.node(id))
    }

    pub fn link_by_name(&self, name: &str) -> Option<&Link> {
        self.link_id(name).and_then(|id| self.link(id))
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(id.slot())
    }

    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id.slot())
    }

    /// Links incident to `node`.
    pub fn links_at(&self, node: NodeId) -> &[LinkId] {
        self.adjacency
            .get(node.slot())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Multiplier of an optional pattern at `time_s`; 1.0 without a pattern.
    pub fn pattern_multiplier(&self, pattern: Option<PatternId>, time_s: f64) -> f64 {
        pattern
            .and_then(|p| self.pattern(p))
            .map(|p| p.multiplier_at(time_s, self.pattern_timestep_s))
            .unwrap_or(1.0)
    }

    /// Required demand of a junction at `time_s` (m³/s); zero for other nodes.
    pub fn demand_at(&self, node: &Node, time_s: f64) -> f64 {
        match &node.kind {
            NodeKind::Junction(j) => j.base_demand * self.pattern_multiplier(j.demand_pattern, time_s),
            _ => 0.0,
        }
    }

    /// Fixed head of a tank or reservoir at `time_s`.
    pub fn fixed_head_at(&self, node: &Node, time_s: f64) -> Option<f64> {
        match &node.kind {
            NodeKind::Reservoir(r) => {
                Some(r.base_head * self.pattern_multiplier(r.head_pattern, time_s))
            }
            NodeKind::Tank(t) => Some(node.elevation + t.level),
            NodeKind::Junction(_) => None,
        }
    }

    /// Seconds until the next multiplier change of any pattern in use.
    pub fn time_to_next_pattern_step(&self, time_s: f64) -> Option<f64> {
        let mut in_use = Vec::new();
        for node in self.nodes() {
            match &node.kind {
                NodeKind::Junction(j) => in_use.extend(j.demand_pattern),
                NodeKind::Reservoir(r) => in_use.extend(r.head_pattern),
                NodeKind::Tank(_) => {}
            }
        }
        in_use
            .into_iter()
            .filter_map(|p| self.pattern(p))
            .filter_map(|p| p.time_to_next_step(time_s, self.pattern_timestep_s))
            .reduce(f64::min)
    }

    /// Request a new link status. A change bumps the structure version.
    pub fn set_link_status(&mut self, id: LinkId, status: LinkStatus) -> NetworkResult<bool> {
        let changed = self.try_link_mut(id)?.set_status(status)?;
        if changed {
            self.bump_structure();
        }
        Ok(changed)
    }

    /// Change pump speed or valve setting. Settings are parameters, so the
    /// structure version is untouched.
    pub fn set_link_setting(&mut self, id: LinkId, value: f64) -> NetworkResult<bool> {
        self.try_link_mut(id)?.set_setting(value)
    }

    /// Install the status chosen by an automatic status check.
    pub fn set_solver_status(&mut self, id: LinkId, status: LinkStatus) -> NetworkResult<bool> {
        let link = self.try_link_mut(id)?;
        if link.solver_status == status {
            return Ok(false);
        }
        link.solver_status = status;
        self.bump_structure();
        Ok(true)
    }

    /// Move a tank to `level`, which must lie within its level limits.
    pub fn set_tank_level(&mut self, id: NodeId, level: f64) -> NetworkResult<()> {
        let node = self.node_mut(id).ok_or(NetworkError::UnknownId {
            kind: "node",
            index: id.index(),
        })?;
        let tank = node.as_tank().ok_or_else(|| NetworkError::UnsupportedAttribute {
            element: node.name.clone(),
            attribute: "level",
        })?;
        if !level.is_finite() || level < tank.min_level || level > tank.max_level {
            return Err(NetworkError::invalid(
                &node.name,
                "level",
                format!(
                    "{level} outside [{}, {}]",
                    tank.min_level, tank.max_level
                ),
            ));
        }
        node.set_tank_level(level);
        Ok(())
    }

    /// Remove a link. The id is never reused.
    pub fn remove_link(&mut self, id: LinkId) -> NetworkResult<Link> {
        let link = self
            .links
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(NetworkError::UnknownId {
                kind: "link",
                index: id.index(),
            })?;
        self.link_names.remove(&link.name);
        for end in [link.start, link.end] {
            if let Some(adj) = self.adjacency.get_mut(end.slot()) {
                adj.retain(|l| *l != id);
            }
        }
        self.bump_structure();
        Ok(link)
    }

    /// Remove a node that no link references.
    pub fn remove_node(&mut self, id: NodeId) -> NetworkResult<Node> {
        let name = self.try_node(id)?.name.clone();
        let in_use = self.links_at(id).len();
        if in_use > 0 {
            return Err(NetworkError::NodeInUse {
                node: name,
                links: in_use,
            });
        }
        let node = self
            .nodes
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(NetworkError::UnknownId {
                kind: "node",
                index: id.index(),
            })?;
        self.node_names.remove(&node.name);
        self.bump_structure();
        Ok(node)
    }
}
