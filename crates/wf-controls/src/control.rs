//! Simple controls and prioritized rules.

use serde::{Deserialize, Serialize};

use crate::action::ControlAction;
use crate::condition::Condition;

/// One condition driving one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub name: String,
    pub condition: Condition,
    pub action: ControlAction,
    /// Only consulted under `ConflictPolicy::HighestPriorityWins`.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl Control {
    pub fn new(name: impl Into<String>, condition: Condition, action: ControlAction) -> Self {
        Self {
            name: name.into(),
            condition,
            action,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Condition tree with ordered then/else action lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub condition: Condition,
    #[serde(default, rename = "then")]
    pub then_actions: Vec<ControlAction>,
    #[serde(default, rename = "else")]
    pub else_actions: Vec<ControlAction>,
    #[serde(default)]
    pub priority: i32,
}

impl Rule {
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            condition,
            then_actions: Vec::new(),
            else_actions: Vec::new(),
            priority: 0,
        }
    }

    pub fn then(mut self, action: ControlAction) -> Self {
        self.then_actions.push(action);
        self
    }

    pub fn otherwise(mut self, action: ControlAction) -> Self {
        self.else_actions.push(action);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
