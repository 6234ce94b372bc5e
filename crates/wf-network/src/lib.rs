//! wf-network: element state for water distribution networks.
//!
//! Provides:
//! - Node elements (junctions, tanks, reservoirs) and link elements (pipes, pumps, valves)
//! - Multiplier patterns and pump curves
//! - Incremental builder with validation
//! - Typed attribute access used by the control engine
//!
//! # Example
//!
//! ```
//! use wf_core::units::{cms, m};
//! use wf_network::{NetworkBuilder, PipeSpec};
//!
//! let mut builder = NetworkBuilder::new();
//! let r = builder.add_reservoir("R1", m(100.0)).unwrap();
//! let j = builder.add_junction("J1", m(50.0), cms(0.01)).unwrap();
//! builder
//!     .add_pipe("P1", r, j, PipeSpec::new(m(1000.0), m(0.3), 100.0))
//!     .unwrap();
//! let network = builder.build().unwrap();
//!
//! assert_eq!(network.node_count(), 2);
//! assert_eq!(network.link_count(), 1);
//! ```

pub mod attribute;
pub mod builder;
pub mod curve;
pub mod error;
pub mod link;
pub mod network;
pub mod node;
pub mod pattern;
pub(crate) mod validate;

pub use attribute::{LinkAttribute, NodeAttribute};
pub use builder::NetworkBuilder;
pub use curve::{Curve, HeadCurveCoeffs};
pub use error::{NetworkError, NetworkResult};
pub use link::{Link, LinkKind, LinkStatus, Pipe, PipeSpec, Pump, PumpSpec, Valve, ValveKind, ValveSpec};
pub use network::Network;
pub use node::{Junction, Leak, Node, NodeKind, NodeState, Reservoir, Tank, TankSpec};
pub use pattern::Pattern;
