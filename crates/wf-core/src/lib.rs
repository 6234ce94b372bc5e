//! wf-core: stable foundation for waterflow.
//!
//! Contains:
//! - units (uom SI types + constructors for hydraulic quantities)
//! - numeric (float comparison + hydraulic tolerances)
//! - ids (typed compact IDs for nodes, links, patterns and curves)

pub mod ids;
pub mod numeric;
pub mod units;

pub use ids::*;
pub use numeric::*;
pub use units::*;
