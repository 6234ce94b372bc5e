//! Post-solve status checks.
//!
//! After a converged solve, links whose behavior depends on the solution
//! (check valves, pumps, regulating valves, links into full or out of empty
//! tanks) may need a different equation form. Changes go to the link's
//! solver status only; the status a control asked for is never touched.

use tracing::debug;
use wf_core::{FLOW_TOLERANCE, HEAD_TOLERANCE, LinkId, NodeId};
use wf_network::{Link, LinkKind, LinkStatus, Network, Pump, ValveKind};

use crate::error::HydraulicsResult;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub link: LinkId,
    pub name: String,
    pub from: LinkStatus,
    pub to: LinkStatus,
}

/// Re-evaluate solver statuses against the solution currently stored on the
/// network. Returns the changes made; an empty list means the structure is
/// consistent with the solution.
pub fn check_statuses(network: &mut Network) -> HydraulicsResult<Vec<StatusChange>> {
    let mut changes = Vec::new();
    for link in network.links() {
        if link.status == LinkStatus::Closed {
            continue;
        }
        let desired = desired_status(network, link);
        if desired != link.solver_status {
            changes.push(StatusChange {
                link: link.id,
                name: link.name.clone(),
                from: link.solver_status,
                to: desired,
            });
        }
    }
    for change in &changes {
        network.set_solver_status(change.link, change.to)?;
        debug!(
            link = %change.name,
            from = change.from.as_str(),
            to = change.to.as_str(),
            "status check changed link"
        );
    }
    Ok(changes)
}

fn desired_status(network: &Network, link: &Link) -> LinkStatus {
    let head = |id: NodeId| network.node(id).map_or(0.0, |n| n.state.head);
    let elevation = |id: NodeId| network.node(id).map_or(0.0, |n| n.elevation);
    let (h1, h2) = (head(link.start), head(link.end));
    let (q, s) = (link.flow, link.solver_status);

    if tank_blocks(network, link) {
        return LinkStatus::Closed;
    }
    match &link.kind {
        LinkKind::Pipe(_) if link.status == LinkStatus::CheckValve => check_valve(s, q, h1 - h2),
        LinkKind::Pipe(_) => LinkStatus::Open,
        LinkKind::Pump(pump) => pump_status(pump, s, q, h2 - h1, link.setting),
        LinkKind::Valve(v) if link.status == LinkStatus::Active => match v.kind {
            ValveKind::Prv => prv_status(s, q, h1, h2, link.setting + elevation(link.end)),
            ValveKind::Psv => psv_status(s, q, h1, h2, link.setting + elevation(link.start)),
            ValveKind::Fcv => fcv_status(s, q, h1, h2, link.setting),
            ValveKind::Pbv | ValveKind::Tcv => LinkStatus::Active,
        },
        LinkKind::Valve(_) => link.status,
    }
}

fn check_valve(s: LinkStatus, q: f64, dh: f64) -> LinkStatus {
    if dh < -HEAD_TOLERANCE {
        LinkStatus::Closed
    } else if s == LinkStatus::Open && q < -FLOW_TOLERANCE {
        LinkStatus::Closed
    } else if dh > HEAD_TOLERANCE {
        LinkStatus::Open
    } else {
        s
    }
}

fn pump_status(pump: &Pump, s: LinkStatus, q: f64, gain: f64, speed: f64) -> LinkStatus {
    let Pump::HeadCurve { coeffs, .. } = pump else {
        return LinkStatus::Open;
    };
    let shutoff = speed * speed * coeffs.a;
    match s {
        LinkStatus::Closed if gain < shutoff - HEAD_TOLERANCE => LinkStatus::Open,
        LinkStatus::Closed => LinkStatus::Closed,
        _ if q < -FLOW_TOLERANCE || gain > shutoff + HEAD_TOLERANCE => LinkStatus::Closed,
        _ => LinkStatus::Open,
    }
}

/// Pressure reducing valve; `hset` is the downstream head setpoint.
fn prv_status(s: LinkStatus, q: f64, h1: f64, h2: f64, hset: f64) -> LinkStatus {
    match s {
        LinkStatus::Active if q < -FLOW_TOLERANCE => LinkStatus::Closed,
        LinkStatus::Active if h1 < hset - HEAD_TOLERANCE => LinkStatus::Open,
        LinkStatus::Active => LinkStatus::Active,
        LinkStatus::Open if q < -FLOW_TOLERANCE => LinkStatus::Closed,
        LinkStatus::Open if h2 >= hset + HEAD_TOLERANCE => LinkStatus::Active,
        LinkStatus::Open => LinkStatus::Open,
        _ if h1 >= hset + HEAD_TOLERANCE && h2 < hset - HEAD_TOLERANCE => LinkStatus::Active,
        _ if h1 < hset - HEAD_TOLERANCE && h1 > h2 + HEAD_TOLERANCE => LinkStatus::Open,
        _ => LinkStatus::Closed,
    }
}

/// Pressure sustaining valve; `hset` is the upstream head setpoint.
fn psv_status(s: LinkStatus, q: f64, h1: f64, h2: f64, hset: f64) -> LinkStatus {
    match s {
        LinkStatus::Active if q < -FLOW_TOLERANCE => LinkStatus::Closed,
        LinkStatus::Active if h2 > hset + HEAD_TOLERANCE => LinkStatus::Open,
        LinkStatus::Active => LinkStatus::Active,
        LinkStatus::Open if q < -FLOW_TOLERANCE => LinkStatus::Closed,
        LinkStatus::Open if h1 < hset - HEAD_TOLERANCE => LinkStatus::Active,
        LinkStatus::Open => LinkStatus::Open,
        _ if h2 > hset + HEAD_TOLERANCE && h1 > h2 + HEAD_TOLERANCE => LinkStatus::Open,
        _ if h1 >= hset + HEAD_TOLERANCE && h1 > h2 + HEAD_TOLERANCE => LinkStatus::Active,
        _ => LinkStatus::Closed,
    }
}

/// Flow control valve opens fully when it cannot pass its setting.
fn fcv_status(s: LinkStatus, q: f64, h1: f64, h2: f64, setting: f64) -> LinkStatus {
    if h1 - h2 < -HEAD_TOLERANCE || q < -FLOW_TOLERANCE {
        LinkStatus::Open
    } else if s != LinkStatus::Active && q >= setting - FLOW_TOLERANCE {
        LinkStatus::Active
    } else if s == LinkStatus::Closed {
        LinkStatus::Active
    } else {
        s
    }
}

/// A link must stay closed while it would fill a full tank or drain an
/// empty one.
fn tank_blocks(network: &Network, link: &Link) -> bool {
    let is_pump = matches!(link.kind, LinkKind::Pump(_));
    let closed = link.solver_status == LinkStatus::Closed;
    // (tank end, other end, sign turning link flow into tank inflow)
    for (tank_end, other_end, sign) in [(link.start, link.end, -1.0), (link.end, link.start, 1.0)] {
        let Some(tank_node) = network.node(tank_end) else { continue };
        let Some(tank) = tank_node.as_tank() else { continue };
        let tank_head = tank_node.state.head;
        let other_head = network.node(other_end).map_or(tank_head, |n| n.state.head);
        let inflow = sign * link.flow;

        if tank.is_full() {
            let blocked = if is_pump {
                tank_end == link.end
            } else if closed {
                other_head > tank_head + HEAD_TOLERANCE
            } else {
                inflow > FLOW_TOLERANCE
            };
            if blocked {
                return true;
            }
        }
        if tank.is_empty() {
            let blocked = if is_pump {
                tank_end == link.start
            } else if closed {
                other_head < tank_head - HEAD_TOLERANCE
            } else {
                inflow < -FLOW_TOLERANCE
            };
            if blocked {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_valve_closes_on_reverse_head() {
        assert_eq!(check_valve(LinkStatus::Open, -0.01, -1.0), LinkStatus::Closed);
        assert_eq!(check_valve(LinkStatus::Closed, 0.0, 2.0), LinkStatus::Open);
        assert_eq!(check_valve(LinkStatus::Closed, 0.0, 0.0), LinkStatus::Closed);
    }

    #[test]
    fn prv_transitions() {
        // Upstream head too low to regulate: open fully.
        assert_eq!(prv_status(LinkStatus::Active, 0.01, 40.0, 40.0, 50.0), LinkStatus::Open);
        // Downstream above setpoint while open: regulate.
        assert_eq!(prv_status(LinkStatus::Open, 0.01, 80.0, 60.0, 50.0), LinkStatus::Active);
        // Reverse flow closes.
        assert_eq!(prv_status(LinkStatus::Active, -0.01, 80.0, 50.0, 50.0), LinkStatus::Closed);
        assert_eq!(prv_status(LinkStatus::Closed, 0.0, 80.0, 40.0, 50.0), LinkStatus::Active);
    }

    #[test]
    fn fcv_opens_when_it_cannot_pass_setting() {
        assert_eq!(fcv_status(LinkStatus::Active, 0.02, 10.0, 12.0, 0.02), LinkStatus::Open);
        assert_eq!(fcv_status(LinkStatus::Open, 0.03, 15.0, 12.0, 0.02), LinkStatus::Active);
        assert_eq!(fcv_status(LinkStatus::Open, 0.01, 15.0, 12.0, 0.02), LinkStatus::Open);
    }
}
