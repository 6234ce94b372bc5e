//! Result data types.

use serde::{Deserialize, Serialize};
use wf_network::{Link, LinkStatus, Network, Node};

/// Hydraulic state of every element after one converged step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub time_s: f64,
    /// Newton iterations summed over all solves of the step
    pub iterations: usize,
    pub residual_norm: f64,
    /// Solve attempts used by the retry policy (1 when the first succeeded)
    #[serde(default = "one")]
    pub attempts: usize,
    #[serde(default)]
    pub conflicts: usize,
    pub nodes: Vec<NodeSnapshot>,
    pub links: Vec<LinkSnapshot>,
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub head_m: f64,
    pub pressure_m: f64,
    pub demand_cms: f64,
    #[serde(default)]
    pub leak_cms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub name: String,
    pub flow_cms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_ms: Option<f64>,
    pub status: LinkStatus,
    pub setting: f64,
}

impl NodeSnapshot {
    pub fn of(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            head_m: node.state.head,
            pressure_m: node.state.pressure,
            demand_cms: node.state.demand,
            leak_cms: node.state.leak_demand,
            level_m: node.as_tank().map(|t| t.level),
        }
    }
}

impl LinkSnapshot {
    /// The reported status is the one the solver actually used.
    pub fn of(link: &Link) -> Self {
        Self {
            name: link.name.clone(),
            flow_cms: link.flow,
            velocity_ms: link.velocity(),
            status: link.solver_status,
            setting: link.setting,
        }
    }
}

impl StepRecord {
    /// Snapshot the network after a converged solve.
    pub fn capture(network: &Network, time_s: f64, iterations: usize, residual_norm: f64) -> Self {
        Self {
            time_s,
            iterations,
            residual_norm,
            attempts: 1,
            conflicts: 0,
            nodes: network.nodes().map(NodeSnapshot::of).collect(),
            links: network.links().map(LinkSnapshot::of).collect(),
        }
    }

    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn link(&self, name: &str) -> Option<&LinkSnapshot> {
        self.links.iter().find(|l| l.name == name)
    }
}
