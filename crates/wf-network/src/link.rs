//! Link elements: pipes, pumps and valves.

use serde::{Deserialize, Serialize};
use wf_core::units::{Length, Power};
use wf_core::{CurveId, LinkId, NodeId};

use crate::attribute::LinkAttribute;
use crate::curve::HeadCurveCoeffs;
use crate::error::{NetworkError, NetworkResult};

/// Link status as requested by the model or a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Open,
    Closed,
    /// Valve regulating at its setting.
    Active,
    /// Pipe open for forward flow only.
    #[serde(rename = "cv")]
    CheckValve,
}

impl LinkStatus {
    /// Numeric encoding used when a condition reads the status attribute.
    pub fn as_number(&self) -> f64 {
        match self {
            LinkStatus::Closed => 0.0,
            LinkStatus::Open | LinkStatus::CheckValve => 1.0,
            LinkStatus::Active => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Open => "open",
            LinkStatus::Closed => "closed",
            LinkStatus::Active => "active",
            LinkStatus::CheckValve => "cv",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub length: f64,
    pub diameter: f64,
    /// Hazen-Williams C factor or Darcy-Weisbach absolute roughness (m)
    pub roughness: f64,
    pub minor_loss: f64,
    pub check_valve: bool,
}

/// Pipe geometry passed to the builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeSpec {
    pub length: Length,
    pub diameter: Length,
    pub roughness: f64,
    pub minor_loss: f64,
    pub check_valve: bool,
}

impl PipeSpec {
    pub fn new(length: Length, diameter: Length, roughness: f64) -> Self {
        Self {
            length,
            diameter,
            roughness,
            minor_loss: 0.0,
            check_valve: false,
        }
    }

    pub fn with_minor_loss(mut self, k: f64) -> Self {
        self.minor_loss = k;
        self
    }

    pub fn with_check_valve(mut self) -> Self {
        self.check_valve = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pump {
    /// Head gain from a fitted curve, scaled by speed (the link setting).
    HeadCurve {
        curve: CurveId,
        coeffs: HeadCurveCoeffs,
    },
    /// Constant hydraulic power (W).
    Power { power_w: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpSpec {
    HeadCurve(CurveId),
    Power(Power),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValveKind {
    /// Pressure reducing: caps downstream pressure at the setting.
    Prv,
    /// Pressure sustaining: keeps upstream pressure at the setting.
    Psv,
    /// Pressure breaker: fixed head drop equal to the setting.
    Pbv,
    /// Flow control: caps flow at the setting.
    Fcv,
    /// Throttle control: minor loss coefficient equal to the setting.
    Tcv,
}

impl ValveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValveKind::Prv => "PRV",
            ValveKind::Psv => "PSV",
            ValveKind::Pbv => "PBV",
            ValveKind::Fcv => "FCV",
            ValveKind::Tcv => "TCV",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Valve {
    pub kind: ValveKind,
    pub diameter: f64,
    /// Minor loss coefficient when fully open
    pub minor_loss: f64,
}

/// Valve definition passed to the builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValveSpec {
    pub kind: ValveKind,
    pub diameter: Length,
    pub setting: f64,
    pub minor_loss: f64,
}

impl ValveSpec {
    pub fn new(kind: ValveKind, diameter: Length, setting: f64) -> Self {
        Self {
            kind,
            diameter,
            setting,
            minor_loss: 0.0,
        }
    }

    pub fn with_minor_loss(mut self, k: f64) -> Self {
        self.minor_loss = k;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    Pipe(Pipe),
    Pump(Pump),
    Valve(Valve),
}

/// A directed connection between two nodes.
///
/// `start` and `end` are lookups into the owning network; positive flow runs
/// from start to end. `status` is what the model or a control asked for;
/// `solver_status` is what the equation builder installs after automatic
/// status checks (check valves, regulating valves, pumps).
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub start: NodeId,
    pub end: NodeId,
    pub kind: LinkKind,
    pub status: LinkStatus,
    pub solver_status: LinkStatus,
    /// Pump relative speed or valve setting; unused for pipes
    pub setting: f64,
    /// Flow from start to end (m³/s)
    pub flow: f64,
}

impl Link {
    pub(crate) fn new(
        id: LinkId,
        name: String,
        start: NodeId,
        end: NodeId,
        kind: LinkKind,
        setting: f64,
    ) -> Self {
        let status = match &kind {
            LinkKind::Pipe(p) if p.check_valve => LinkStatus::CheckValve,
            LinkKind::Pipe(_) | LinkKind::Pump(_) => LinkStatus::Open,
            LinkKind::Valve(v) if v.kind == ValveKind::Tcv => LinkStatus::Open,
            LinkKind::Valve(_) => LinkStatus::Active,
        };
        let solver_status = Self::initial_solver_status(&kind, status);
        Self {
            id,
            name,
            start,
            end,
            kind,
            status,
            solver_status,
            setting,
            flow: 0.0,
        }
    }

    /// A sustaining valve starts open: fixing its upstream head before any
    /// solve leaves a dead-end downstream side without a head equation. The
    /// status check activates it once upstream pressure drops below setting.
    fn initial_solver_status(kind: &LinkKind, status: LinkStatus) -> LinkStatus {
        match (kind, status) {
            (_, LinkStatus::CheckValve) => LinkStatus::Open,
            (LinkKind::Valve(v), LinkStatus::Active) if v.kind == ValveKind::Psv => LinkStatus::Open,
            (_, other) => other,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            LinkKind::Pipe(_) => "pipe",
            LinkKind::Pump(_) => "pump",
            LinkKind::Valve(_) => "valve",
        }
    }

    /// Inner diameter (m); pumps have none.
    pub fn diameter(&self) -> Option<f64> {
        match &self.kind {
            LinkKind::Pipe(p) => Some(p.diameter),
            LinkKind::Valve(v) => Some(v.diameter),
            LinkKind::Pump(_) => None,
        }
    }

    /// Mean velocity magnitude (m/s).
    pub fn velocity(&self) -> Option<f64> {
        self.diameter().map(|d| {
            let area = std::f64::consts::PI * d * d / 4.0;
            self.flow.abs() / area
        })
    }

    /// The link carries no flow in the current equation structure.
    pub fn is_closed(&self) -> bool {
        self.solver_status == LinkStatus::Closed
    }

    pub fn other_end(&self, node: NodeId) -> NodeId {
        if node == self.start { self.end } else { self.start }
    }

    /// Read a link attribute; `None` when the attribute does not apply.
    pub fn attribute(&self, attr: LinkAttribute) -> Option<f64> {
        match attr {
            LinkAttribute::Flow => Some(self.flow),
            LinkAttribute::Velocity => self.velocity(),
            LinkAttribute::Status => Some(self.status.as_number()),
            LinkAttribute::Setting => match self.kind {
                LinkKind::Pipe(_) => None,
                _ => Some(self.setting),
            },
        }
    }

    /// Request a new status. Returns whether the status changed.
    ///
    /// Opening a check-valve pipe keeps its check valve. `Active` is only
    /// meaningful for regulating valves.
    pub fn set_status(&mut self, status: LinkStatus) -> NetworkResult<bool> {
        let status = match (&self.kind, status) {
            (LinkKind::Pipe(p), LinkStatus::Open) if p.check_valve => LinkStatus::CheckValve,
            (LinkKind::Pipe(p), LinkStatus::CheckValve) if !p.check_valve => {
                return Err(NetworkError::invalid(
                    &self.name,
                    "status",
                    "pipe has no check valve",
                ));
            }
            (LinkKind::Pipe(_) | LinkKind::Pump(_), LinkStatus::Active) => {
                return Err(NetworkError::invalid(
                    &self.name,
                    "status",
                    "only valves can be active",
                ));
            }
            (LinkKind::Pump(_) | LinkKind::Valve(_), LinkStatus::CheckValve) => {
                return Err(NetworkError::invalid(
                    &self.name,
                    "status",
                    "only pipes carry check valves",
                ));
            }
            (_, s) => s,
        };
        if status == self.status {
            return Ok(false);
        }
        self.status = status;
        self.solver_status = Self::initial_solver_status(&self.kind, status);
        Ok(true)
    }

    /// Change pump speed or valve setting. Returns whether the value changed.
    pub fn set_setting(&mut self, value: f64) -> NetworkResult<bool> {
        if !value.is_finite() {
            return Err(NetworkError::invalid(&self.name, "setting", "must be finite"));
        }
        match &self.kind {
            LinkKind::Pipe(_) => {
                return Err(NetworkError::UnsupportedAttribute {
                    element: self.name.clone(),
                    attribute: "setting",
                });
            }
            LinkKind::Pump(_) if value <= 0.0 => {
                return Err(NetworkError::invalid(
                    &self.name,
                    "setting",
                    "pump speed must be positive; close the pump instead",
                ));
            }
            LinkKind::Valve(_) if value < 0.0 => {
                return Err(NetworkError::invalid(
                    &self.name,
                    "setting",
                    "valve setting must be non-negative",
                ));
            }
            _ => {}
        }
        if value == self.setting {
            return Ok(false);
        }
        self.setting = value;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe(check_valve: bool) -> Link {
        Link::new(
            LinkId::from_index(0),
            "P1".into(),
            NodeId::from_index(0),
            NodeId::from_index(1),
            LinkKind::Pipe(Pipe {
                length: 100.0,
                diameter: 0.2,
                roughness: 100.0,
                minor_loss: 0.0,
                check_valve,
            }),
            0.0,
        )
    }

    fn prv() -> Link {
        Link::new(
            LinkId::from_index(1),
            "V1".into(),
            NodeId::from_index(0),
            NodeId::from_index(1),
            LinkKind::Valve(Valve {
                kind: ValveKind::Prv,
                diameter: 0.2,
                minor_loss: 0.0,
            }),
            30.0,
        )
    }

    #[test]
    fn initial_statuses_follow_element_kind() {
        assert_eq!(pipe(false).status, LinkStatus::Open);
        let cv = pipe(true);
        assert_eq!(cv.status, LinkStatus::CheckValve);
        assert_eq!(cv.solver_status, LinkStatus::Open);
        assert_eq!(prv().status, LinkStatus::Active);
        assert_eq!(prv().solver_status, LinkStatus::Active);
        let mut psv = prv();
        psv.kind = LinkKind::Valve(Valve {
            kind: ValveKind::Psv,
            diameter: 0.2,
            minor_loss: 0.0,
        });
        psv.set_status(LinkStatus::Closed).unwrap();
        psv.set_status(LinkStatus::Active).unwrap();
        assert_eq!(psv.status, LinkStatus::Active);
        assert_eq!(psv.solver_status, LinkStatus::Open);
    }

    #[test]
    fn set_status_is_idempotent() {
        let mut link = pipe(false);
        assert!(link.set_status(LinkStatus::Closed).unwrap());
        assert!(!link.set_status(LinkStatus::Closed).unwrap());
        assert!(link.is_closed());
    }

    #[test]
    fn reopening_check_valve_pipe_keeps_check_valve() {
        let mut link = pipe(true);
        link.set_status(LinkStatus::Closed).unwrap();
        link.set_status(LinkStatus::Open).unwrap();
        assert_eq!(link.status, LinkStatus::CheckValve);
    }

    #[test]
    fn pipes_cannot_be_active_or_set() {
        let mut link = pipe(false);
        assert!(link.set_status(LinkStatus::Active).is_err());
        assert!(matches!(
            link.set_setting(1.0),
            Err(NetworkError::UnsupportedAttribute { .. })
        ));
        assert_eq!(link.attribute(LinkAttribute::Setting), None);
    }

    #[test]
    fn velocity_from_flow_and_diameter() {
        let mut link = pipe(false);
        link.flow = -0.0314159;
        let v = link.velocity().unwrap();
        assert!((v - 0.0314159 / (std::f64::consts::PI * 0.01)).abs() < 1e-9);
    }

    #[test]
    fn valve_setting_change_reports_change() {
        let mut link = prv();
        assert!(!link.set_setting(30.0).unwrap());
        assert!(link.set_setting(25.0).unwrap());
        assert!(link.set_setting(-1.0).is_err());
    }
}
