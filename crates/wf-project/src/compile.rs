//! Turn a validated [`Project`] into runtime objects.

use tracing::debug;
use wf_controls::ControlEngine;
use wf_core::units::{cms, kw, m};
use wf_core::{LinkId, NodeId};
use wf_network::{
    Leak, LinkStatus, Network, NetworkBuilder, PipeSpec, PumpSpec, TankSpec, ValveSpec,
};
use wf_sim::{SimOptions, Simulator};

use crate::schema::{LeakDef, Project};
use crate::validate::{ValidationError, validate_project};
use crate::{ProjectError, ProjectResult};

/// Network, control engine and options ready to simulate.
#[derive(Debug, Clone)]
pub struct CompiledProject {
    pub network: Network,
    pub controls: ControlEngine,
    pub options: SimOptions,
}

impl CompiledProject {
    pub fn into_simulator(self) -> ProjectResult<Simulator> {
        Ok(Simulator::new(self.network, self.controls, self.options)?)
    }
}

fn missing(name: &str, context: &str) -> ProjectError {
    ValidationError::MissingReference {
        name: name.to_string(),
        context: context.to_string(),
    }
    .into()
}

fn node(builder: &NetworkBuilder, name: &str, context: &str) -> ProjectResult<NodeId> {
    builder.node_id(name).ok_or_else(|| missing(name, context))
}

fn attach_leak(builder: &mut NetworkBuilder, id: NodeId, leak: &Option<LeakDef>) -> ProjectResult<()> {
    if let Some(leak) = leak {
        builder.set_leak(
            id,
            Leak {
                area: leak.area_m2,
                discharge_coeff: leak.discharge_coeff,
            },
        )?;
    }
    Ok(())
}

fn build_network(project: &Project) -> ProjectResult<Network> {
    let mut b = NetworkBuilder::new();
    if let Some(step) = project.pattern_timestep_s {
        b.set_pattern_timestep(step)?;
    }
    for p in &project.patterns {
        b.add_pattern(p.name.clone(), p.multipliers.clone())?;
    }
    for c in &project.curves {
        b.add_curve(c.name.clone(), c.points.iter().map(|[q, h]| (*q, *h)).collect())?;
    }

    for j in &project.junctions {
        let id = b.add_junction(j.name.clone(), m(j.elevation_m), cms(j.demand_cms))?;
        if let Some(p) = &j.pattern {
            let pid = b.pattern_id(p).ok_or_else(|| missing(p, "junction pattern"))?;
            b.set_demand_pattern(id, pid)?;
        }
        attach_leak(&mut b, id, &j.leak)?;
    }
    for t in &project.tanks {
        let id = b.add_tank(
            t.name.clone(),
            TankSpec {
                elevation: t.elevation_m,
                init_level: t.init_level_m,
                min_level: t.min_level_m,
                max_level: t.max_level_m,
                diameter: t.diameter_m,
            },
        )?;
        attach_leak(&mut b, id, &t.leak)?;
    }
    for r in &project.reservoirs {
        let id = b.add_reservoir(r.name.clone(), m(r.head_m))?;
        if let Some(p) = &r.pattern {
            let pid = b.pattern_id(p).ok_or_else(|| missing(p, "reservoir pattern"))?;
            b.set_head_pattern(id, pid)?;
        }
    }

    let mut statuses: Vec<(LinkId, LinkStatus)> = Vec::new();
    for p in &project.pipes {
        let from = node(&b, &p.from, "pipe from")?;
        let to = node(&b, &p.to, "pipe to")?;
        let mut spec = PipeSpec::new(m(p.length_m), m(p.diameter_m), p.roughness)
            .with_minor_loss(p.minor_loss);
        if p.check_valve {
            spec = spec.with_check_valve();
        }
        let id = b.add_pipe(p.name.clone(), from, to, spec)?;
        if let Some(status) = p.status {
            statuses.push((id, status));
        }
    }
    for p in &project.pumps {
        let from = node(&b, &p.from, "pump from")?;
        let to = node(&b, &p.to, "pump to")?;
        let spec = match (&p.curve, p.power_kw) {
            (Some(curve), _) => {
                PumpSpec::HeadCurve(b.curve_id(curve).ok_or_else(|| missing(curve, "pump curve"))?)
            }
            (None, Some(power)) => PumpSpec::Power(kw(power)),
            (None, None) => {
                return Err(ValidationError::InvalidValue {
                    field: format!("pump '{}'", p.name),
                    value: "curve/power_kw".into(),
                    reason: "exactly one of curve or power_kw is required".into(),
                }
                .into());
            }
        };
        let id = b.add_pump(p.name.clone(), from, to, spec)?;
        if let Some(speed) = p.speed {
            b.set_initial_setting(id, speed)?;
        }
        if let Some(status) = p.status {
            statuses.push((id, status));
        }
    }
    for v in &project.valves {
        let from = node(&b, &v.from, "valve from")?;
        let to = node(&b, &v.to, "valve to")?;
        let spec = ValveSpec::new(v.kind, m(v.diameter_m), v.setting).with_minor_loss(v.minor_loss);
        let id = b.add_valve(v.name.clone(), from, to, spec)?;
        if let Some(status) = v.status {
            statuses.push((id, status));
        }
    }
    for (id, status) in statuses {
        b.set_initial_status(id, status)?;
    }
    Ok(b.build()?)
}

/// Validate `project` and build its network, controls and options.
pub fn compile(project: &Project) -> ProjectResult<CompiledProject> {
    validate_project(project)?;
    project.options.validate()?;
    let network = build_network(project)?;

    let mut controls = ControlEngine::with_policy(project.options.conflict_policy);
    for c in &project.controls {
        controls.add_control(c.clone())?;
    }
    for r in &project.rules {
        controls.add_rule(r.clone())?;
    }
    controls.check_references(&network)?;

    debug!(
        project = %project.name,
        nodes = network.node_count(),
        links = network.link_count(),
        controls = controls.len(),
        "project compiled"
    );
    Ok(CompiledProject {
        network,
        controls,
        options: project.options.clone(),
    })
}
