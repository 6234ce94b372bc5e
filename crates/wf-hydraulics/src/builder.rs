//! Hydraulic equation builder.
//!
//! Translates network topology and element state into AML variables and
//! constraints. The structure depends only on link solver statuses, node
//! connectivity and the options; everything that varies between steps
//! (demands, fixed heads, speeds, settings, resistances) is a parameter and
//! is refreshed without a rebuild.

use std::collections::VecDeque;
use std::f64::consts::PI;

use tracing::debug;
use wf_aml::{Expr, Model, ParamId, VarId};
use wf_core::units::constants::{G, WATER_DENSITY};
use wf_core::{LinkId, NodeId};
use wf_network::{Link, LinkKind, LinkStatus, Network, Node, NodeKind, Pump, ValveKind};

use crate::error::HydraulicsResult;
use crate::headloss::{
    HW_EXPONENT, MIN_VALVE_LOSS, darcy_resistance, friction_factor, hazen_williams_resistance,
    minor_loss_coefficient, pipe_headloss_expr,
};
use crate::options::{DemandModel, HeadlossModel, HydraulicOptions};
use crate::smooth::{PressureDemand, leak_flow_expr};

/// Velocity (m/s) used to seed flows that have no previous value.
const INITIAL_VELOCITY: f64 = 0.3;

/// Equation form installed for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkForm {
    /// `q = 0`
    Closed,
    Pipe,
    Pump,
    /// Regulating valve holding its setting
    ActiveValve(ValveKind),
    /// Valve acting as a minor loss
    OpenValve,
}

impl LinkForm {
    fn of(link: &Link, isolated: bool) -> Self {
        if isolated || link.solver_status == LinkStatus::Closed {
            return LinkForm::Closed;
        }
        match &link.kind {
            LinkKind::Pipe(_) => LinkForm::Pipe,
            LinkKind::Pump(_) => LinkForm::Pump,
            LinkKind::Valve(v) if v.kind == ValveKind::Tcv => LinkForm::OpenValve,
            LinkKind::Valve(v) if link.solver_status == LinkStatus::Active => {
                LinkForm::ActiveValve(v.kind)
            }
            LinkKind::Valve(_) => LinkForm::OpenValve,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeSlots {
    head: Option<VarId>,
    /// Delivered demand under pressure-driven mode
    demand: Option<VarId>,
    leak: Option<VarId>,
    /// Requested demand
    demand_param: Option<ParamId>,
    fixed_head: Option<ParamId>,
    isolated: bool,
}

#[derive(Debug, Clone, Copy)]
struct LinkSlots {
    flow: Option<VarId>,
    resistance: Option<ParamId>,
    setting: Option<ParamId>,
    form: LinkForm,
}

impl Default for LinkSlots {
    fn default() -> Self {
        Self {
            flow: None,
            resistance: None,
            setting: None,
            form: LinkForm::Closed,
        }
    }
}

/// The algebraic model of one network structure plus the mapping between
/// network elements and model variables/parameters.
#[derive(Debug, Clone)]
pub struct HydraulicModel {
    model: Model,
    options: HydraulicOptions,
    nodes: Vec<NodeSlots>,
    links: Vec<LinkSlots>,
    network_version: u64,
}

fn pipe_area(diameter: f64) -> f64 {
    PI * diameter * diameter / 4.0
}

/// Nodes reachable from a fixed-head node through links that are not closed.
pub fn connected_nodes(network: &Network) -> Vec<bool> {
    let mut seen = vec![false; network.node_slots()];
    let mut queue: VecDeque<NodeId> = network
        .nodes()
        .filter(|n| n.has_fixed_head())
        .map(|n| n.id)
        .collect();
    for id in &queue {
        seen[id.slot()] = true;
    }
    while let Some(id) = queue.pop_front() {
        for &l in network.links_at(id) {
            let Some(link) = network.link(l) else { continue };
            if link.solver_status == LinkStatus::Closed {
                continue;
            }
            let other = link.other_end(id);
            if !seen[other.slot()] {
                seen[other.slot()] = true;
                queue.push_back(other);
            }
        }
    }
    seen
}

/// Flow used to seed a link that has no converged value yet.
fn seed_flow(link: &Link) -> f64 {
    match &link.kind {
        LinkKind::Pipe(p) => pipe_area(p.diameter) * INITIAL_VELOCITY,
        LinkKind::Valve(v) => pipe_area(v.diameter) * INITIAL_VELOCITY,
        LinkKind::Pump(Pump::HeadCurve { coeffs, .. }) => 0.5 * coeffs.max_flow(link.setting),
        LinkKind::Pump(Pump::Power { .. }) => 0.01,
    }
}

impl HydraulicModel {
    /// Declare the full equation structure for the current network state.
    ///
    /// Variables start from the network's current heads and flows.
    pub fn build(network: &Network, options: &HydraulicOptions, time_s: f64) -> HydraulicsResult<Self> {
        options.validate()?;
        let connected = connected_nodes(network);
        let pressure_driven = options.demand_model == DemandModel::PressureDriven;
        let mut model = Model::new();
        let mut nodes = vec![NodeSlots::default(); network.node_slots()];
        let mut links = vec![LinkSlots::default(); network.link_slots()];

        for node in network.nodes() {
            let slots = &mut nodes[node.id.slot()];
            slots.isolated = !connected[node.id.slot()];
            slots.head = Some(model.declare_variable(format!("head[{}]", node.name), node.state.head)?);
            if slots.isolated {
                continue;
            }
            match &node.kind {
                NodeKind::Junction(j) => {
                    let requested = network.demand_at(node, time_s);
                    slots.demand_param =
                        Some(model.declare_parameter(format!("demand[{}]", node.name), requested)?);
                    if pressure_driven && j.base_demand > 0.0 {
                        slots.demand = Some(
                            model.declare_variable(format!("demand[{}]", node.name), node.state.demand)?,
                        );
                    }
                }
                NodeKind::Tank(_) | NodeKind::Reservoir(_) => {
                    let head = network.fixed_head_at(node, time_s).unwrap_or(node.state.head);
                    slots.fixed_head =
                        Some(model.declare_parameter(format!("fixed_head[{}]", node.name), head)?);
                }
            }
            if node.leak().is_some() {
                slots.leak = Some(
                    model.declare_variable(format!("leak[{}]", node.name), node.state.leak_demand)?,
                );
            }
        }

        for link in network.links() {
            let isolated = nodes[link.start.slot()].isolated || nodes[link.end.slot()].isolated;
            let form = LinkForm::of(link, isolated);
            let initial = match form {
                LinkForm::Closed => 0.0,
                _ if link.flow != 0.0 => link.flow,
                _ => seed_flow(link),
            };
            let slots = &mut links[link.id.slot()];
            slots.form = form;
            slots.flow = Some(model.declare_variable(format!("flow[{}]", link.name), initial)?);
            match form {
                LinkForm::Pipe | LinkForm::OpenValve => {
                    slots.resistance =
                        Some(model.declare_parameter(format!("resistance[{}]", link.name), 0.0)?);
                }
                LinkForm::Pump | LinkForm::ActiveValve(_) => {
                    slots.setting = Some(
                        model.declare_parameter(format!("setting[{}]", link.name), link.setting)?,
                    );
                }
                LinkForm::Closed => {}
            }
        }

        let mut this = Self {
            model,
            options: options.clone(),
            nodes,
            links,
            network_version: network.structure_version(),
        };
        this.declare_node_constraints(network)?;
        this.declare_link_constraints(network)?;
        this.model.finalize_structure()?;
        this.refresh_parameters(network, time_s)?;
        debug!(
            variables = this.model.num_variables(),
            constraints = this.model.num_constraints(),
            network_version = this.network_version,
            "built hydraulic model"
        );
        Ok(this)
    }

    fn head(&self, node: NodeId) -> Expr {
        self.nodes[node.slot()]
            .head
            .map_or(Expr::zero(), Expr::var)
    }

    fn declare_node_constraints(&mut self, network: &Network) -> HydraulicsResult<()> {
        let pdd = PressureDemand {
            minimum: self.options.minimum_pressure,
            required: self.options.required_pressure,
            exponent: self.options.pressure_exponent,
        };
        for node in network.nodes() {
            let slots = self.nodes[node.id.slot()];
            let head = self.head(node.id);
            let pressure = head.clone() - node.elevation;

            if slots.isolated {
                self.model
                    .declare_constraint(format!("isolated[{}]", node.name), head - node.elevation)?;
                continue;
            }
            if let Some(fixed) = slots.fixed_head {
                self.model
                    .declare_constraint(format!("fixed_head[{}]", node.name), head - Expr::param(fixed))?;
            } else {
                let mut terms = Vec::new();
                for &l in network.links_at(node.id) {
                    let (Some(link), Some(flow)) = (network.link(l), self.links[l.slot()].flow) else {
                        continue;
                    };
                    if link.end == node.id {
                        terms.push(Expr::var(flow));
                    } else {
                        terms.push(-Expr::var(flow));
                    }
                }
                match (slots.demand, slots.demand_param) {
                    (Some(d), _) => terms.push(-Expr::var(d)),
                    (None, Some(p)) => terms.push(-Expr::param(p)),
                    (None, None) => {}
                }
                if let Some(leak) = slots.leak {
                    terms.push(-Expr::var(leak));
                }
                self.model
                    .declare_constraint(format!("balance[{}]", node.name), Expr::sum(terms))?;
            }

            if let (Some(d), Some(p)) = (slots.demand, slots.demand_param) {
                self.model.declare_constraint(
                    format!("pdd[{}]", node.name),
                    Expr::var(d) - Expr::param(p) * pdd.fraction_expr(pressure.clone()),
                )?;
            }
            if let (Some(leak_var), Some(leak)) = (slots.leak, node.leak()) {
                self.model.declare_constraint(
                    format!("leak[{}]", node.name),
                    Expr::var(leak_var) - leak_flow_expr(pressure, leak.area, leak.discharge_coeff),
                )?;
            }
        }
        Ok(())
    }

    fn declare_link_constraints(&mut self, network: &Network) -> HydraulicsResult<()> {
        for link in network.links() {
            let slots = self.links[link.id.slot()];
            let Some(flow) = slots.flow else { continue };
            let q = Expr::var(flow);
            let h_start = self.head(link.start);
            let h_end = self.head(link.end);
            let elevation = |id: NodeId| network.node(id).map_or(0.0, |n| n.elevation);

            let expr = match (slots.form, &link.kind) {
                (LinkForm::Closed, _) => q,
                (LinkForm::Pipe, LinkKind::Pipe(pipe)) => {
                    let exponent = match self.options.headloss {
                        HeadlossModel::HazenWilliams => HW_EXPONENT,
                        HeadlossModel::DarcyWeisbach => 2.0,
                    };
                    let minor = minor_loss_coefficient(pipe.minor_loss, pipe.diameter);
                    let r = slots.resistance.map_or(Expr::zero(), Expr::param);
                    h_start - h_end - pipe_headloss_expr(q, r, exponent, minor)
                }
                (LinkForm::Pump, LinkKind::Pump(Pump::HeadCurve { coeffs, .. })) => {
                    let s = slots.setting.map_or(Expr::constant(1.0), Expr::param);
                    let gain = s.clone().powf(2.0) * coeffs.a
                        - s.powf(2.0 - coeffs.c) * coeffs.b * q.abs_pow(coeffs.c);
                    h_end - h_start - gain
                }
                (LinkForm::Pump, LinkKind::Pump(Pump::Power { power_w })) => {
                    (h_end - h_start) * q - *power_w / (WATER_DENSITY * G)
                }
                (LinkForm::ActiveValve(kind), _) => {
                    let setting = slots.setting.map_or(Expr::zero(), Expr::param);
                    match kind {
                        ValveKind::Prv => h_end - setting - elevation(link.end),
                        ValveKind::Psv => h_start - setting - elevation(link.start),
                        ValveKind::Pbv => h_start - h_end - setting,
                        ValveKind::Fcv => q - setting,
                        ValveKind::Tcv => {
                            let r = slots.resistance.map_or(Expr::zero(), Expr::param);
                            h_start - h_end - pipe_headloss_expr(q, r, 2.0, 0.0)
                        }
                    }
                }
                (LinkForm::OpenValve, _) => {
                    let r = slots.resistance.map_or(Expr::zero(), Expr::param);
                    h_start - h_end - pipe_headloss_expr(q, r, 2.0, 0.0)
                }
                // Form and kind always agree; treat a mismatch as closed.
                _ => q,
            };
            self.model
                .declare_constraint(format!("link[{}]", link.name), expr)?;
        }
        Ok(())
    }

    /// Update every parameter from the network at `time_s`. The structure is
    /// untouched.
    pub fn refresh_parameters(&mut self, network: &Network, time_s: f64) -> HydraulicsResult<()> {
        for node in network.nodes() {
            let slots = self.nodes[node.id.slot()];
            if let Some(p) = slots.demand_param {
                self.model.set_parameter(p, network.demand_at(node, time_s))?;
            }
            if let (Some(p), Some(head)) = (slots.fixed_head, network.fixed_head_at(node, time_s)) {
                self.model.set_parameter(p, head)?;
            }
        }
        for link in network.links() {
            let slots = self.links[link.id.slot()];
            if let Some(p) = slots.setting {
                self.model.set_parameter(p, link.setting)?;
            }
            if let Some(p) = slots.resistance {
                let r = self.resistance(link, slots)?;
                self.model.set_parameter(p, r)?;
            }
        }
        Ok(())
    }

    fn resistance(&self, link: &Link, slots: LinkSlots) -> HydraulicsResult<f64> {
        Ok(match &link.kind {
            LinkKind::Pipe(pipe) => match self.options.headloss {
                HeadlossModel::HazenWilliams => {
                    hazen_williams_resistance(pipe.length, pipe.diameter, pipe.roughness)
                }
                HeadlossModel::DarcyWeisbach => {
                    let q = match slots.flow {
                        Some(v) => self.model.variable(v)?,
                        None => 0.0,
                    };
                    let q = if q == 0.0 { seed_flow(link) } else { q };
                    let f = friction_factor(q, pipe.diameter, pipe.roughness, self.options.viscosity);
                    darcy_resistance(pipe.length, pipe.diameter, f)
                }
            },
            LinkKind::Valve(valve) => {
                let k = if valve.kind == ValveKind::Tcv {
                    link.setting
                } else {
                    valve.minor_loss
                };
                minor_loss_coefficient(k.max(MIN_VALVE_LOSS), valve.diameter)
            }
            LinkKind::Pump(_) => 0.0,
        })
    }

    /// Recompute flow-dependent pipe resistances at the current iterate and
    /// report whether the equations still hold within `tolerance`. Only
    /// Darcy-Weisbach friction depends on flow.
    pub fn resistances_settled(&mut self, network: &Network, tolerance: f64) -> HydraulicsResult<bool> {
        if self.options.headloss != HeadlossModel::DarcyWeisbach {
            return Ok(true);
        }
        for link in network.links() {
            let slots = self.links[link.id.slot()];
            if let (Some(p), LinkKind::Pipe(_)) = (slots.resistance, &link.kind) {
                let r = self.resistance(link, slots)?;
                self.model.set_parameter(p, r)?;
            }
        }
        let residuals = self.model.evaluate_residuals()?;
        Ok(residuals.amax() < tolerance)
    }

    /// Replace the current iterate with a cold guess: junction heads at the
    /// mean fixed head, flows at their seed values.
    pub fn reset_initial_guess(&mut self, network: &Network) -> HydraulicsResult<()> {
        let fixed: Vec<f64> = network
            .nodes()
            .filter_map(|n| self.nodes[n.id.slot()].fixed_head)
            .map(|p| self.model.parameter(p))
            .collect::<Result<_, _>>()?;
        let mean = if fixed.is_empty() {
            None
        } else {
            Some(fixed.iter().sum::<f64>() / fixed.len() as f64)
        };
        for node in network.nodes() {
            let slots = self.nodes[node.id.slot()];
            let Some(head) = slots.head else { continue };
            let guess = match (slots.fixed_head, slots.isolated) {
                (Some(p), _) => self.model.parameter(p)?,
                (None, true) => node.elevation,
                (None, false) => mean.unwrap_or(node.elevation).max(node.elevation),
            };
            self.model.set_variable(head, guess)?;
            if let (Some(d), Some(p)) = (slots.demand, slots.demand_param) {
                let requested = self.model.parameter(p)?;
                self.model.set_variable(d, requested)?;
            }
            if let Some(leak) = slots.leak {
                self.model.set_variable(leak, 0.0)?;
            }
        }
        for link in network.links() {
            let slots = self.links[link.id.slot()];
            let Some(flow) = slots.flow else { continue };
            let guess = match slots.form {
                LinkForm::Closed => 0.0,
                _ => seed_flow(link),
            };
            self.model.set_variable(flow, guess)?;
        }
        Ok(())
    }

    /// Write the converged solution back onto the network.
    pub fn apply_solution(&self, network: &mut Network) -> HydraulicsResult<()> {
        let node_ids: Vec<NodeId> = network.nodes().map(|n| n.id).collect();
        for id in node_ids {
            let slots = self.nodes.get(id.slot()).copied().unwrap_or_default();
            let Some(head_var) = slots.head else { continue };
            let head = self.model.variable(head_var)?;
            let demand = match (slots.demand, slots.demand_param) {
                (Some(v), _) => self.model.variable(v)?,
                (None, Some(p)) => self.model.parameter(p)?,
                (None, None) => 0.0,
            };
            let leak = match slots.leak {
                Some(v) => self.model.variable(v)?,
                None => 0.0,
            };
            if let Some(node) = network.node_mut(id) {
                write_node_state(node, head, demand, leak);
            }
        }
        let link_ids: Vec<LinkId> = network.links().map(|l| l.id).collect();
        for id in link_ids {
            let slots = self.links.get(id.slot()).copied().unwrap_or_default();
            let flow = match (slots.form, slots.flow) {
                (LinkForm::Closed, _) | (_, None) => 0.0,
                (_, Some(v)) => self.model.variable(v)?,
            };
            if let Some(link) = network.link_mut(id) {
                link.flow = flow;
            }
        }
        Ok(())
    }

    /// Whether the structure no longer matches the network or options.
    pub fn needs_rebuild(&self, network: &Network, options: &HydraulicOptions) -> bool {
        self.network_version != network.structure_version() || &self.options != options
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn options(&self) -> &HydraulicOptions {
        &self.options
    }

    /// Network structure version this model was built from.
    pub fn network_version(&self) -> u64 {
        self.network_version
    }

    pub fn link_form(&self, link: LinkId) -> Option<LinkForm> {
        self.links.get(link.slot()).filter(|s| s.flow.is_some()).map(|s| s.form)
    }

    pub fn is_isolated(&self, node: NodeId) -> bool {
        self.nodes.get(node.slot()).is_some_and(|s| s.isolated)
    }

    pub fn flow_var(&self, link: LinkId) -> Option<VarId> {
        self.links.get(link.slot()).and_then(|s| s.flow)
    }

    pub fn head_var(&self, node: NodeId) -> Option<VarId> {
        self.nodes.get(node.slot()).and_then(|s| s.head)
    }
}

fn write_node_state(node: &mut Node, head: f64, demand: f64, leak: f64) {
    node.state.head = head;
    node.state.pressure = head - node.elevation;
    node.state.demand = demand;
    node.state.leak_demand = leak;
}
