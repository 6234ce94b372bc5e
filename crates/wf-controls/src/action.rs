//! Actions: a new status or setting for one link.

use serde::{Deserialize, Serialize};
use wf_network::{LinkAttribute, LinkStatus, Network};

use crate::error::{ControlError, ControlResult};

/// Value written by an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSetting {
    Status(LinkStatus),
    /// Pump speed or valve setting
    Setting(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlAction {
    /// Target link name
    pub link: String,
    pub set: ActionSetting,
}

/// Result of writing one action into the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionEffect {
    pub changed: bool,
    /// The change alters equation structure (status changes do).
    pub structural: bool,
}

impl ControlAction {
    pub fn status(link: impl Into<String>, status: LinkStatus) -> Self {
        Self {
            link: link.into(),
            set: ActionSetting::Status(status),
        }
    }

    pub fn setting(link: impl Into<String>, value: f64) -> Self {
        Self {
            link: link.into(),
            set: ActionSetting::Setting(value),
        }
    }

    /// The link attribute this action writes.
    pub fn attribute(&self) -> LinkAttribute {
        match self.set {
            ActionSetting::Status(_) => LinkAttribute::Status,
            ActionSetting::Setting(_) => LinkAttribute::Setting,
        }
    }

    /// Fail with `DanglingReference` if the target link is gone.
    pub fn check_reference(&self, network: &Network, source: &str) -> ControlResult<()> {
        match network.link_id(&self.link) {
            Some(_) => Ok(()),
            None => Err(self.dangling(source)),
        }
    }

    fn dangling(&self, source: &str) -> ControlError {
        ControlError::DanglingReference {
            source_name: source.to_string(),
            kind: "link",
            element: self.link.clone(),
        }
    }

    /// Write the action. Reapplying the same action is a no-op.
    pub fn apply(&self, network: &mut Network, source: &str) -> ControlResult<ActionEffect> {
        let id = network
            .link_id(&self.link)
            .ok_or_else(|| self.dangling(source))?;
        let effect = match self.set {
            ActionSetting::Status(status) => {
                let changed = network.set_link_status(id, status)?;
                ActionEffect {
                    changed,
                    structural: changed,
                }
            }
            ActionSetting::Setting(value) => ActionEffect {
                changed: network.set_link_setting(id, value)?,
                structural: false,
            },
        };
        Ok(effect)
    }

    /// Whether two actions would leave the target in the same state.
    pub(crate) fn same_effect(&self, other: &ControlAction) -> bool {
        self.link == other.link && self.set == other.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_core::units::{cms, m};
    use wf_network::{NetworkBuilder, PipeSpec, ValveKind, ValveSpec};

    fn network() -> Network {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", m(100.0)).unwrap();
        let j1 = b.add_junction("J1", m(50.0), cms(0.0)).unwrap();
        let j2 = b.add_junction("J2", m(40.0), cms(0.01)).unwrap();
        b.add_pipe("P1", r, j1, PipeSpec::new(m(1000.0), m(0.3), 100.0))
            .unwrap();
        b.add_valve("V1", j1, j2, ValveSpec::new(ValveKind::Prv, m(0.3), 30.0))
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn status_change_is_structural() {
        let mut net = network();
        let v0 = net.structure_version();
        let close = ControlAction::status("P1", LinkStatus::Closed);
        let effect = close.apply(&mut net, "c").unwrap();
        assert!(effect.changed && effect.structural);
        assert!(net.structure_version() > v0);

        let again = close.apply(&mut net, "c").unwrap();
        assert_eq!(again, ActionEffect::default());
    }

    #[test]
    fn setting_change_is_not_structural() {
        let mut net = network();
        let v0 = net.structure_version();
        let effect = ControlAction::setting("V1", 25.0)
            .apply(&mut net, "c")
            .unwrap();
        assert!(effect.changed);
        assert!(!effect.structural);
        assert_eq!(net.structure_version(), v0);
        assert_eq!(net.link_by_name("V1").unwrap().setting, 25.0);
    }

    #[test]
    fn missing_link_is_dangling() {
        let mut net = network();
        let err = ControlAction::status("NOPE", LinkStatus::Open)
            .apply(&mut net, "rule-1")
            .unwrap_err();
        assert!(matches!(err, ControlError::DanglingReference { .. }));
    }

    #[test]
    fn setting_on_pipe_is_rejected() {
        let mut net = network();
        let err = ControlAction::setting("P1", 1.0)
            .apply(&mut net, "c")
            .unwrap_err();
        assert!(matches!(err, ControlError::Network(_)));
    }
}
