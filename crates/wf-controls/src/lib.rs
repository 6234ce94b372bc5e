//! Simple controls and prioritized rules for water networks.
//!
//! Controls and rules read the live network state through a
//! [`ControlContext`] and produce [`ControlAction`]s that change a link's
//! status or setting before the next hydraulic solve.
//!
//! # Evaluation order
//!
//! Rules run first, in descending priority (ties keep insertion order),
//! followed by simple controls in insertion order. When two triggered actions
//! target the same link attribute, the [`ConflictPolicy`] decides the winner;
//! the default is last write wins.

pub mod action;
pub mod condition;
pub mod context;
pub mod control;
pub mod engine;
pub mod error;

pub use action::{ActionSetting, ControlAction};
pub use condition::{Comparison, Condition, ElementRef};
pub use context::ControlContext;
pub use control::{Control, Rule};
pub use engine::{ApplyOutcome, Conflict, ConflictPolicy, ControlEngine, Evaluation, TriggeredAction};
pub use error::{ControlError, ControlResult};
