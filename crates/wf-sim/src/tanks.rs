//! Tank level integration between hydraulic solves.

use tracing::warn;
use wf_core::NodeId;
use wf_network::{Network, Node};

use crate::error::SimResult;

/// Crossings closer than this (s) are treated as already reached.
pub(crate) const MIN_CROSSING_S: f64 = 1.0;

/// Net inflow (m³/s) into a node from its links, minus leakage.
pub(crate) fn net_inflow(network: &Network, node: &Node) -> f64 {
    let links: f64 = network
        .links_at(node.id)
        .iter()
        .filter_map(|&l| network.link(l))
        .map(|link| {
            if link.end == node.id {
                link.flow
            } else if link.start == node.id {
                -link.flow
            } else {
                0.0
            }
        })
        .sum();
    links - node.state.leak_demand
}

/// Rate of level change (m/s) for each tank.
fn level_rates(network: &Network) -> Vec<(NodeId, f64)> {
    network
        .nodes()
        .filter_map(|node| {
            let tank = node.as_tank()?;
            Some((node.id, net_inflow(network, node) / tank.area()))
        })
        .collect()
}

/// Time until the first tank reaches one of its limits or a level named by
/// a control, given the current flows.
pub(crate) fn time_to_level_crossing(
    network: &Network,
    thresholds: &[(String, f64)],
) -> Option<f64> {
    let mut earliest: Option<f64> = None;
    for (id, rate) in level_rates(network) {
        if rate == 0.0 {
            continue;
        }
        let Some(node) = network.node(id) else { continue };
        let Some(tank) = node.as_tank() else { continue };
        let named = thresholds
            .iter()
            .filter(|(name, _)| *name == node.name)
            .map(|(_, level)| *level);
        for target in [tank.min_level, tank.max_level].into_iter().chain(named) {
            let dt = (target - tank.level) / rate;
            if dt >= MIN_CROSSING_S {
                earliest = Some(earliest.map_or(dt, |e| e.min(dt)));
            }
        }
    }
    earliest
}

/// Advance every tank level by `dt` seconds at the current flows, clamped
/// to the tank's limits.
pub(crate) fn integrate_levels(network: &mut Network, dt: f64) -> SimResult<()> {
    for (id, rate) in level_rates(network) {
        let Some(tank) = network.node(id).and_then(|n| n.as_tank()) else {
            continue;
        };
        let (min, max) = (tank.min_level, tank.max_level);
        let raw = tank.level + rate * dt;
        let level = raw.clamp(min, max);
        if level != raw {
            let name = network.node(id).map(|n| n.name.clone()).unwrap_or_default();
            warn!(tank = %name, level = raw, clamped = level, "tank level clamped");
        }
        network.set_tank_level(id, level)?;
    }
    Ok(())
}
