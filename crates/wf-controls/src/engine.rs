//! Ordered evaluation of rules and controls.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wf_network::{LinkAttribute, Network};

use crate::action::ControlAction;
use crate::condition::Condition;
use crate::context::ControlContext;
use crate::control::{Control, Rule};
use crate::error::{ControlError, ControlResult};

/// How two triggered actions on the same link attribute are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The later-evaluated action wins.
    #[default]
    LastWriteWins,
    /// The higher priority wins; equal priorities fall back to last write.
    /// Controls without a priority count as 0.
    HighestPriorityWins,
}

/// An action selected by evaluation, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAction {
    pub source: String,
    pub priority: i32,
    pub action: ControlAction,
}

/// Two triggered actions wrote different values to one link attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub link: String,
    pub attribute: LinkAttribute,
    pub winner: String,
    pub overridden: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// At most one action per link attribute, after conflict resolution
    pub actions: Vec<TriggeredAction>,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Number of actions that changed the network
    pub changed: usize,
    /// Whether any change requires rebuilding the equations
    pub structural: bool,
}

/// Registry of controls and rules sharing one name space.
#[derive(Debug, Clone, Default)]
pub struct ControlEngine {
    rules: Vec<Rule>,
    controls: Vec<Control>,
    names: HashSet<String>,
    policy: ConflictPolicy,
}

impl ControlEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ConflictPolicy) {
        self.policy = policy;
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn claim(&mut self, name: &str) -> ControlResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(ControlError::AlreadyExists {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_control(&mut self, control: Control) -> ControlResult<()> {
        control.condition.validate(&control.name)?;
        self.claim(&control.name)?;
        self.controls.push(control);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: Rule) -> ControlResult<()> {
        rule.condition.validate(&rule.name)?;
        self.claim(&rule.name)?;
        self.rules.push(rule);
        Ok(())
    }

    /// Remove a control or rule by name.
    pub fn remove(&mut self, name: &str) -> ControlResult<()> {
        if !self.names.remove(name) {
            return Err(ControlError::NotFound {
                name: name.to_string(),
            });
        }
        self.controls.retain(|c| c.name != name);
        self.rules.retain(|r| r.name != name);
        Ok(())
    }

    fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.rules
            .iter()
            .map(|r| &r.condition)
            .chain(self.controls.iter().map(|c| &c.condition))
    }

    /// Earliest time after `time_s` at which a time-based condition can flip.
    pub fn next_event_time(&self, time_s: f64, start_clock_s: f64) -> Option<f64> {
        self.conditions()
            .filter_map(|c| c.next_event_time(time_s, start_clock_s))
            .min_by(f64::total_cmp)
    }

    /// Tank levels that some condition compares against.
    pub fn level_thresholds(&self) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        for c in self.conditions() {
            c.level_thresholds(&mut out);
        }
        out
    }

    /// Check every condition and action against the network.
    pub fn check_references(&self, network: &Network) -> ControlResult<()> {
        for rule in &self.rules {
            rule.condition.check_references(network, &rule.name)?;
            for a in rule.then_actions.iter().chain(&rule.else_actions) {
                a.check_reference(network, &rule.name)?;
            }
        }
        for control in &self.controls {
            control.condition.check_references(network, &control.name)?;
            control.action.check_reference(network, &control.name)?;
        }
        Ok(())
    }

    /// Rules by descending priority, stable within ties.
    fn ordered_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        rules
    }

    /// Evaluate every rule and control against the current state.
    pub fn evaluate(&self, ctx: &ControlContext<'_>) -> ControlResult<Evaluation> {
        self.check_references(ctx.network)?;

        let mut triggered = Vec::new();
        for rule in self.ordered_rules() {
            let actions = if rule.condition.evaluate(ctx, &rule.name)? {
                &rule.then_actions
            } else {
                &rule.else_actions
            };
            triggered.extend(actions.iter().map(|a| TriggeredAction {
                source: rule.name.clone(),
                priority: rule.priority,
                action: a.clone(),
            }));
        }
        for control in &self.controls {
            if control.condition.evaluate(ctx, &control.name)? {
                triggered.push(TriggeredAction {
                    source: control.name.clone(),
                    priority: control.priority.unwrap_or(0),
                    action: control.action.clone(),
                });
            }
        }

        Ok(self.resolve(triggered, ctx.time_s))
    }

    fn resolve(&self, triggered: Vec<TriggeredAction>, time_s: f64) -> Evaluation {
        let mut eval = Evaluation::default();
        for next in triggered {
            let slot = eval.actions.iter().position(|t| {
                t.action.link == next.action.link && t.action.attribute() == next.action.attribute()
            });
            let Some(i) = slot else {
                eval.actions.push(next);
                continue;
            };
            let current = &eval.actions[i];
            if current.action.same_effect(&next.action) {
                continue;
            }
            let replace = match self.policy {
                ConflictPolicy::LastWriteWins => true,
                ConflictPolicy::HighestPriorityWins => next.priority >= current.priority,
            };
            let (winner, loser) = if replace {
                (&next, current)
            } else {
                (current, &next)
            };
            warn!(
                time_s,
                link = %next.action.link,
                attribute = next.action.attribute().as_str(),
                winner = %winner.source,
                overridden = %loser.source,
                "conflicting control actions"
            );
            eval.conflicts.push(Conflict {
                link: next.action.link.clone(),
                attribute: next.action.attribute(),
                winner: winner.source.clone(),
                overridden: loser.source.clone(),
            });
            if replace {
                eval.actions[i] = next;
            }
        }
        eval
    }

    /// Write resolved actions into the network.
    pub fn apply(
        &self,
        actions: &[TriggeredAction],
        network: &mut Network,
    ) -> ControlResult<ApplyOutcome> {
        let mut outcome = ApplyOutcome::default();
        for t in actions {
            let effect = t.action.apply(network, &t.source)?;
            if effect.changed {
                info!(
                    source = %t.source,
                    link = %t.action.link,
                    value = ?t.action.set,
                    "control action applied"
                );
                outcome.changed += 1;
                outcome.structural |= effect.structural;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Comparison, ElementRef};
    use wf_core::units::{cms, m};
    use wf_network::{LinkStatus, NetworkBuilder, NodeAttribute, PipeSpec};

    fn network() -> Network {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", m(100.0)).unwrap();
        let j = b.add_junction("J1", m(50.0), cms(0.01)).unwrap();
        b.add_pipe("P1", r, j, PipeSpec::new(m(1000.0), m(0.3), 100.0))
            .unwrap();
        b.build().unwrap()
    }

    fn always() -> Condition {
        Condition::at_time(0.0)
    }

    #[test]
    fn duplicate_names_rejected_across_kinds() {
        let mut engine = ControlEngine::new();
        engine
            .add_control(Control::new(
                "x",
                always(),
                ControlAction::status("P1", LinkStatus::Closed),
            ))
            .unwrap();
        let err = engine.add_rule(Rule::new("x", always())).unwrap_err();
        assert_eq!(err, ControlError::AlreadyExists { name: "x".into() });
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn self_comparing_rule_rejected_before_claiming_name() {
        let mut engine = ControlEngine::new();
        let cond = Condition::Relative {
            left: ElementRef::node("J1", NodeAttribute::Pressure),
            op: Comparison::Lt,
            right: ElementRef::node("J1", NodeAttribute::Head),
            offset: 0.0,
        };
        let err = engine.add_rule(Rule::new("r", cond)).unwrap_err();
        assert!(matches!(err, ControlError::SelfComparison { ref element, .. } if element == "J1"));
        assert!(engine.is_empty());
        engine.add_rule(Rule::new("r", always())).unwrap();
    }

    #[test]
    fn remove_frees_the_name() {
        let mut engine = ControlEngine::new();
        engine.add_rule(Rule::new("r", always())).unwrap();
        engine.remove("r").unwrap();
        assert!(engine.is_empty());
        engine.add_rule(Rule::new("r", always())).unwrap();
        assert!(matches!(
            engine.remove("missing"),
            Err(ControlError::NotFound { .. })
        ));
    }

    #[test]
    fn rules_ordered_by_priority_then_insertion() {
        let mut engine = ControlEngine::new();
        for (name, priority) in [("a", 1), ("b", 5), ("c", 1), ("d", 5)] {
            engine
                .add_rule(Rule::new(name, always()).with_priority(priority))
                .unwrap();
        }
        let order: Vec<&str> = engine.ordered_rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);
    }

    #[test]
    fn controls_override_rules_under_last_write() {
        let net = network();
        let mut engine = ControlEngine::new();
        engine
            .add_control(Control::new(
                "ctl",
                always(),
                ControlAction::status("P1", LinkStatus::Open),
            ))
            .unwrap();
        engine
            .add_rule(
                Rule::new("rule", always())
                    .then(ControlAction::status("P1", LinkStatus::Closed))
                    .with_priority(10),
            )
            .unwrap();
        let eval = engine.evaluate(&ControlContext::new(&net, 0.0, 0.0)).unwrap();
        assert_eq!(eval.actions.len(), 1);
        assert_eq!(eval.actions[0].source, "ctl");
        assert_eq!(eval.conflicts.len(), 1);
        assert_eq!(eval.conflicts[0].overridden, "rule");
    }

    #[test]
    fn highest_priority_policy_keeps_rule() {
        let net = network();
        let mut engine = ControlEngine::with_policy(ConflictPolicy::HighestPriorityWins);
        engine
            .add_rule(
                Rule::new("rule", always())
                    .then(ControlAction::status("P1", LinkStatus::Closed))
                    .with_priority(10),
            )
            .unwrap();
        engine
            .add_control(Control::new(
                "ctl",
                always(),
                ControlAction::status("P1", LinkStatus::Open),
            ))
            .unwrap();
        let eval = engine.evaluate(&ControlContext::new(&net, 0.0, 0.0)).unwrap();
        assert_eq!(eval.actions[0].source, "rule");
        assert_eq!(eval.conflicts[0].winner, "rule");
    }

    #[test]
    fn agreeing_actions_are_not_conflicts() {
        let net = network();
        let mut engine = ControlEngine::new();
        for name in ["a", "b"] {
            engine
                .add_control(Control::new(
                    name,
                    always(),
                    ControlAction::status("P1", LinkStatus::Closed),
                ))
                .unwrap();
        }
        let eval = engine.evaluate(&ControlContext::new(&net, 0.0, 0.0)).unwrap();
        assert_eq!(eval.actions.len(), 1);
        assert!(eval.conflicts.is_empty());
    }

    #[test]
    fn else_actions_run_when_condition_false() {
        let mut net = network();
        let mut engine = ControlEngine::new();
        engine
            .add_rule(
                Rule::new("r", Condition::at_time(3600.0))
                    .then(ControlAction::status("P1", LinkStatus::Open))
                    .otherwise(ControlAction::status("P1", LinkStatus::Closed)),
            )
            .unwrap();
        let eval = engine.evaluate(&ControlContext::new(&net, 0.0, 0.0)).unwrap();
        let outcome = engine.apply(&eval.actions, &mut net).unwrap();
        assert_eq!(outcome.changed, 1);
        assert!(outcome.structural);
        assert_eq!(net.link_by_name("P1").unwrap().status, LinkStatus::Closed);
        assert_eq!(engine.next_event_time(0.0, 0.0), Some(3600.0));
    }

    #[test]
    fn evaluate_reports_dangling_action_target() {
        let mut net = network();
        let mut engine = ControlEngine::new();
        engine
            .add_control(Control::new(
                "c",
                Condition::value(
                    ElementRef::node("J1", NodeAttribute::Pressure),
                    Comparison::Lt,
                    10.0,
                ),
                ControlAction::status("P1", LinkStatus::Closed),
            ))
            .unwrap();
        let p1 = net.link_id("P1").unwrap();
        net.remove_link(p1).unwrap();
        let err = engine
            .evaluate(&ControlContext::new(&net, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, ControlError::DanglingReference { .. }));
    }
}
