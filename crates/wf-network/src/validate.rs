//! Network-wide checks run when a builder is frozen.

use crate::error::{NetworkError, NetworkResult};
use crate::link::{LinkKind, ValveKind};
use crate::network::Network;
use crate::node::NodeKind;

pub(crate) fn validate_network(network: &Network) -> NetworkResult<()> {
    let has_junction = network
        .nodes()
        .any(|n| matches!(n.kind, NodeKind::Junction(_)));
    if has_junction && !network.nodes().any(|n| n.has_fixed_head()) {
        return Err(NetworkError::NoFixedHead);
    }

    for node in network.nodes() {
        let pattern = match &node.kind {
            NodeKind::Junction(j) => j.demand_pattern,
            NodeKind::Reservoir(r) => r.head_pattern,
            NodeKind::Tank(_) => None,
        };
        if let Some(p) = pattern
            && network.pattern(p).is_none()
        {
            return Err(NetworkError::UnknownId {
                kind: "pattern",
                index: p.index(),
            });
        }
    }

    for link in network.links() {
        let start = network.try_node(link.start)?;
        let end = network.try_node(link.end)?;
        // A pressure-regulated node cannot also have a fixed head.
        if let LinkKind::Valve(v) = &link.kind {
            let regulated = match v.kind {
                ValveKind::Prv => Some(end),
                ValveKind::Psv => Some(start),
                _ => None,
            };
            if let Some(node) = regulated
                && node.has_fixed_head()
            {
                return Err(NetworkError::invalid(
                    &link.name,
                    "connection",
                    format!(
                        "{} cannot regulate fixed-head node '{}'",
                        v.kind.as_str(),
                        node.name
                    ),
                ));
            }
        }
    }
    Ok(())
}
