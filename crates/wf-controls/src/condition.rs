//! Conditions: pure reads of network state and simulation time.

use serde::{Deserialize, Serialize};
use wf_core::units::constants::SECONDS_PER_DAY;
use wf_core::{Tolerances, nearly_equal};
use wf_network::{LinkAttribute, Network, NodeAttribute};

use crate::context::ControlContext;
use crate::error::{ControlError, ControlResult};

/// Absolute tolerance used by [`Comparison::Eq`] and [`Comparison::Ne`].
pub const EQ_TOLERANCE: Tolerances = Tolerances::absolute(1e-6);

/// Clock resolution of time conditions. A strict comparison against `T`
/// first holds at `T + TIME_RESOLUTION_S`.
pub const TIME_RESOLUTION_S: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => nearly_equal(lhs, rhs, EQ_TOLERANCE),
            Comparison::Ne => !nearly_equal(lhs, rhs, EQ_TOLERANCE),
        }
    }

    /// Offsets from a time threshold at which this comparison can change value.
    fn switch_offsets(self) -> &'static [f64] {
        match self {
            Comparison::Ge | Comparison::Lt => &[0.0],
            Comparison::Gt | Comparison::Le => &[TIME_RESOLUTION_S],
            Comparison::Eq | Comparison::Ne => &[0.0, TIME_RESOLUTION_S],
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
        }
    }
}

/// A readable attribute of a named element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum ElementRef {
    Node { name: String, attribute: NodeAttribute },
    Link { name: String, attribute: LinkAttribute },
}

impl ElementRef {
    pub fn node(name: impl Into<String>, attribute: NodeAttribute) -> Self {
        ElementRef::Node {
            name: name.into(),
            attribute,
        }
    }

    pub fn link(name: impl Into<String>, attribute: LinkAttribute) -> Self {
        ElementRef::Link {
            name: name.into(),
            attribute,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ElementRef::Node { name, .. } | ElementRef::Link { name, .. } => name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ElementRef::Node { .. } => "node",
            ElementRef::Link { .. } => "link",
        }
    }

    fn attribute_name(&self) -> &'static str {
        match self {
            ElementRef::Node { attribute, .. } => attribute.as_str(),
            ElementRef::Link { attribute, .. } => attribute.as_str(),
        }
    }

    fn exists(&self, network: &Network) -> bool {
        match self {
            ElementRef::Node { name, .. } => network.node_id(name).is_some(),
            ElementRef::Link { name, .. } => network.link_id(name).is_some(),
        }
    }

    /// Current value of the referenced attribute.
    pub fn read(&self, network: &Network, source: &str) -> ControlResult<f64> {
        let value = match self {
            ElementRef::Node { name, attribute } => network
                .node_by_name(name)
                .map(|n| n.attribute(*attribute)),
            ElementRef::Link { name, attribute } => network
                .link_by_name(name)
                .map(|l| l.attribute(*attribute)),
        };
        match value {
            None => Err(ControlError::DanglingReference {
                source_name: source.to_string(),
                kind: self.kind(),
                element: self.name().to_string(),
            }),
            Some(None) => Err(ControlError::UnsupportedAttribute {
                source_name: source.to_string(),
                element: self.name().to_string(),
                attribute: self.attribute_name(),
            }),
            Some(Some(v)) => Ok(v),
        }
    }
}

/// Closed set of trigger conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// `target op value`
    Value {
        target: ElementRef,
        op: Comparison,
        value: f64,
    },
    /// Elapsed simulation time compared against `seconds`.
    SimTime { op: Comparison, seconds: f64 },
    /// Clock time compared against `seconds` after midnight.
    ///
    /// With `repeat_daily` the comparison uses the time within the current
    /// day, so the condition re-triggers every 24 h. Without it the absolute
    /// clock is used and the condition can trigger on the first day only.
    TimeOfDay {
        op: Comparison,
        seconds: f64,
        #[serde(default = "default_true")]
        repeat_daily: bool,
    },
    /// `left op right + offset` across two distinct elements.
    Relative {
        left: ElementRef,
        op: Comparison,
        right: ElementRef,
        #[serde(default)]
        offset: f64,
    },
    And { all: Vec<Condition> },
    Or { any: Vec<Condition> },
}

fn default_true() -> bool {
    true
}

impl Condition {
    pub fn value(target: ElementRef, op: Comparison, value: f64) -> Self {
        Condition::Value { target, op, value }
    }

    /// True from `seconds` of simulated time onward.
    pub fn at_time(seconds: f64) -> Self {
        Condition::SimTime {
            op: Comparison::Ge,
            seconds,
        }
    }

    pub fn and(all: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And {
            all: all.into_iter().collect(),
        }
    }

    pub fn or(any: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or {
            any: any.into_iter().collect(),
        }
    }

    /// Evaluate against the context. `source` names the owning control for
    /// error reporting.
    pub fn evaluate(&self, ctx: &ControlContext<'_>, source: &str) -> ControlResult<bool> {
        match self {
            Condition::Value { target, op, value } => {
                Ok(op.holds(target.read(ctx.network, source)?, *value))
            }
            Condition::SimTime { op, seconds } => Ok(op.holds(ctx.time_s, *seconds)),
            Condition::TimeOfDay {
                op,
                seconds,
                repeat_daily,
            } => {
                let clock = if *repeat_daily {
                    ctx.time_of_day_s()
                } else {
                    ctx.clock_s()
                };
                Ok(op.holds(clock, *seconds))
            }
            Condition::Relative {
                left,
                op,
                right,
                offset,
            } => {
                let lhs = left.read(ctx.network, source)?;
                let rhs = right.read(ctx.network, source)?;
                Ok(op.holds(lhs, rhs + offset))
            }
            Condition::And { all } => {
                for c in all {
                    if !c.evaluate(ctx, source)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or { any } => {
                for c in any {
                    if c.evaluate(ctx, source)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Fail with `DanglingReference` if any referenced element is missing,
    /// including ones a short-circuit would skip.
    pub fn check_references(&self, network: &Network, source: &str) -> ControlResult<()> {
        let mut missing = None;
        self.visit_refs(&mut |r: &ElementRef| {
            if missing.is_none() && !r.exists(network) {
                missing = Some(r.clone());
            }
        });
        match missing {
            None => Ok(()),
            Some(r) => Err(ControlError::DanglingReference {
                source_name: source.to_string(),
                kind: r.kind(),
                element: r.name().to_string(),
            }),
        }
    }

    fn visit_refs(&self, f: &mut dyn FnMut(&ElementRef)) {
        match self {
            Condition::Value { target, .. } => f(target),
            Condition::Relative { left, right, .. } => {
                f(left);
                f(right);
            }
            Condition::SimTime { .. } | Condition::TimeOfDay { .. } => {}
            Condition::And { all: children } | Condition::Or { any: children } => {
                for c in children {
                    c.visit_refs(f);
                }
            }
        }
    }

    /// Earliest simulation time strictly after `ctx.time_s` at which a time
    /// comparison in this condition can change value.
    pub fn next_event_time(&self, time_s: f64, start_clock_s: f64) -> Option<f64> {
        match self {
            Condition::SimTime { op, seconds } => op
                .switch_offsets()
                .iter()
                .map(|o| seconds + o)
                .filter(|t| *t > time_s)
                .min_by(f64::total_cmp),
            Condition::TimeOfDay {
                op,
                seconds,
                repeat_daily,
            } => {
                let clock = start_clock_s + time_s;
                let today = clock - clock.rem_euclid(SECONDS_PER_DAY);
                op.switch_offsets()
                    .iter()
                    .filter_map(|o| {
                        if *repeat_daily {
                            let mut next = today + (seconds + o).rem_euclid(SECONDS_PER_DAY);
                            if next <= clock {
                                next += SECONDS_PER_DAY;
                            }
                            Some(next - start_clock_s)
                        } else {
                            (seconds + o > clock).then(|| seconds + o - start_clock_s)
                        }
                    })
                    .min_by(f64::total_cmp)
            }
            Condition::Value { .. } | Condition::Relative { .. } => None,
            Condition::And { all: children } | Condition::Or { any: children } => children
                .iter()
                .filter_map(|c| c.next_event_time(time_s, start_clock_s))
                .min_by(f64::total_cmp),
        }
    }

    /// Structural checks that need no network: a relative condition must
    /// compare two different elements.
    pub fn validate(&self, source: &str) -> ControlResult<()> {
        match self {
            Condition::Relative { left, right, .. }
                if left.kind() == right.kind() && left.name() == right.name() =>
            {
                Err(ControlError::SelfComparison {
                    source_name: source.to_string(),
                    element: left.name().to_string(),
                })
            }
            Condition::And { all: children } | Condition::Or { any: children } => {
                children.iter().try_for_each(|c| c.validate(source))
            }
            _ => Ok(()),
        }
    }

    /// Tank levels this condition compares against, as `(tank name, level)`.
    pub fn level_thresholds(&self, out: &mut Vec<(String, f64)>) {
        match self {
            Condition::Value {
                target:
                    ElementRef::Node {
                        name,
                        attribute: NodeAttribute::Level,
                    },
                value,
                ..
            } => out.push((name.clone(), *value)),
            Condition::And { all: children } | Condition::Or { any: children } => {
                for c in children {
                    c.level_thresholds(out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_core::units::{cms, m};
    use wf_network::{NetworkBuilder, PipeSpec, TankSpec};

    fn network() -> Network {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", m(100.0)).unwrap();
        let j = b.add_junction("J1", m(50.0), cms(0.01)).unwrap();
        let t = b
            .add_tank(
                "T1",
                TankSpec {
                    elevation: 60.0,
                    init_level: 4.0,
                    min_level: 1.0,
                    max_level: 8.0,
                    diameter: 10.0,
                },
            )
            .unwrap();
        b.add_pipe("P1", r, j, PipeSpec::new(m(1000.0), m(0.3), 100.0))
            .unwrap();
        b.add_pipe("P2", j, t, PipeSpec::new(m(500.0), m(0.2), 100.0))
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn value_condition_reads_tank_level() {
        let net = network();
        let ctx = ControlContext::new(&net, 0.0, 0.0);
        let low = Condition::value(
            ElementRef::node("T1", NodeAttribute::Level),
            Comparison::Lt,
            5.0,
        );
        assert!(low.evaluate(&ctx, "c").unwrap());
        let high = Condition::value(
            ElementRef::node("T1", NodeAttribute::Level),
            Comparison::Gt,
            5.0,
        );
        assert!(!high.evaluate(&ctx, "c").unwrap());
    }

    #[test]
    fn level_of_junction_is_unsupported() {
        let net = network();
        let ctx = ControlContext::new(&net, 0.0, 0.0);
        let c = Condition::value(
            ElementRef::node("J1", NodeAttribute::Level),
            Comparison::Lt,
            5.0,
        );
        assert!(matches!(
            c.evaluate(&ctx, "c"),
            Err(ControlError::UnsupportedAttribute { .. })
        ));
    }

    #[test]
    fn time_of_day_repeats() {
        let net = network();
        // 06:00 start, trigger at 08:00 each day.
        let c = Condition::TimeOfDay {
            op: Comparison::Ge,
            seconds: 8.0 * 3600.0,
            repeat_daily: true,
        };
        let at = |t: f64| c.evaluate(&ControlContext::new(&net, t, 6.0 * 3600.0), "c").unwrap();
        assert!(!at(0.0));
        assert!(at(2.0 * 3600.0));
        // Next day 07:00 is before the trigger again.
        assert!(!at(25.0 * 3600.0));
        assert!(at(26.0 * 3600.0));

        assert_eq!(c.next_event_time(0.0, 6.0 * 3600.0), Some(2.0 * 3600.0));
        assert_eq!(c.next_event_time(2.0 * 3600.0, 6.0 * 3600.0), Some(26.0 * 3600.0));
    }

    #[test]
    fn time_of_day_without_repeat_fires_once() {
        let net = network();
        let c = Condition::TimeOfDay {
            op: Comparison::Lt,
            seconds: 3600.0,
            repeat_daily: false,
        };
        let at = |t: f64| c.evaluate(&ControlContext::new(&net, t, 0.0), "c").unwrap();
        assert!(at(0.0));
        assert!(!at(7200.0));
        assert!(!at(86_400.0 + 60.0));
        assert_eq!(c.next_event_time(7200.0, 0.0), None);
    }

    #[test]
    fn relative_condition_compares_two_elements() {
        let net = network();
        let ctx = ControlContext::new(&net, 0.0, 0.0);
        // Reservoir head 100 vs tank head 64.
        let c = Condition::Relative {
            left: ElementRef::node("R1", NodeAttribute::Head),
            op: Comparison::Gt,
            right: ElementRef::node("T1", NodeAttribute::Head),
            offset: 30.0,
        };
        assert!(c.evaluate(&ctx, "c").unwrap());
        let c = Condition::Relative {
            left: ElementRef::node("R1", NodeAttribute::Head),
            op: Comparison::Gt,
            right: ElementRef::node("T1", NodeAttribute::Head),
            offset: 40.0,
        };
        assert!(!c.evaluate(&ctx, "c").unwrap());
    }

    #[test]
    fn dangling_reference_found_behind_short_circuit() {
        let net = network();
        let ctx = ControlContext::new(&net, 0.0, 0.0);
        let c = Condition::or([
            Condition::at_time(0.0),
            Condition::value(ElementRef::link("GONE", LinkAttribute::Flow), Comparison::Gt, 0.0),
        ]);
        assert!(c.evaluate(&ctx, "c").unwrap());
        assert_eq!(
            c.check_references(&net, "c"),
            Err(ControlError::DanglingReference {
                source_name: "c".into(),
                kind: "link",
                element: "GONE".into(),
            })
        );
    }

    #[test]
    fn nested_event_time_is_earliest() {
        let c = Condition::and([Condition::at_time(7200.0), Condition::at_time(3600.0)]);
        assert_eq!(c.next_event_time(0.0, 0.0), Some(3600.0));
        assert_eq!(c.next_event_time(3600.0, 0.0), Some(7200.0));
        assert_eq!(c.next_event_time(7200.0, 0.0), None);
    }

    #[test]
    fn equality_uses_absolute_tolerance() {
        assert!(Comparison::Eq.holds(2.0, 2.0 + 5e-7));
        assert!(!Comparison::Eq.holds(2.0, 2.0 + 5e-6));
        // Absolute: large magnitudes get no extra slack.
        assert!(!Comparison::Eq.holds(1.0e6, 1.0e6 + 1e-3));
        assert!(Comparison::Ne.holds(1.0e6, 1.0e6 + 1e-3));
    }

    #[test]
    fn strict_time_comparison_scheduled_after_threshold() {
        let net = network();
        let after = Condition::SimTime {
            op: Comparison::Gt,
            seconds: 3600.0,
        };
        let t = after.next_event_time(0.0, 0.0).unwrap();
        assert_eq!(t, 3600.0 + TIME_RESOLUTION_S);
        assert!(!after.evaluate(&ControlContext::new(&net, 3600.0, 0.0), "c").unwrap());
        assert!(after.evaluate(&ControlContext::new(&net, t, 0.0), "c").unwrap());

        let exact = Condition::SimTime {
            op: Comparison::Eq,
            seconds: 3600.0,
        };
        assert_eq!(exact.next_event_time(0.0, 0.0), Some(3600.0));
        assert_eq!(exact.next_event_time(3600.0, 0.0), Some(3600.0 + TIME_RESOLUTION_S));

        let evening = Condition::TimeOfDay {
            op: Comparison::Le,
            seconds: 79_200.0,
            repeat_daily: true,
        };
        assert_eq!(evening.next_event_time(0.0, 0.0), Some(79_200.0 + TIME_RESOLUTION_S));
    }

    #[test]
    fn relative_condition_needs_two_elements() {
        let same = Condition::Relative {
            left: ElementRef::node("T1", NodeAttribute::Head),
            op: Comparison::Gt,
            right: ElementRef::node("T1", NodeAttribute::Level),
            offset: 0.0,
        };
        assert_eq!(
            Condition::or([Condition::at_time(0.0), same]).validate("c"),
            Err(ControlError::SelfComparison {
                source_name: "c".into(),
                element: "T1".into(),
            })
        );
        let distinct = Condition::Relative {
            left: ElementRef::node("T1", NodeAttribute::Head),
            op: Comparison::Gt,
            right: ElementRef::link("T1", LinkAttribute::Flow),
            offset: 0.0,
        };
        assert!(distinct.validate("c").is_ok());
    }

    #[test]
    fn condition_deserializes_from_json() {
        let json = r#"{
            "type": "and",
            "all": [
                {"type": "sim_time", "op": "ge", "seconds": 3600},
                {"type": "value", "target": {"element": "node", "name": "T1", "attribute": "level"}, "op": "lt", "value": 2.5}
            ]
        }"#;
        let c: Condition = serde_json::from_str(json).unwrap();
        let mut levels = Vec::new();
        c.level_thresholds(&mut levels);
        assert_eq!(levels, vec![("T1".to_string(), 2.5)]);
    }
}
