//! Scenario validation: unique names, resolvable references and physical
//! ranges. Control references are checked against the compiled network.

use std::collections::HashSet;

use crate::schema::{LeakDef, Project};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: String, value: f64, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: String, value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

fn non_negative(field: String, value: f64) -> Result<(), ValidationError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be non-negative"))
    }
}

fn unique<'a>(
    names: impl IntoIterator<Item = &'a String>,
    context: &str,
) -> Result<HashSet<&'a str>, ValidationError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: name.clone(),
                context: context.to_string(),
            });
        }
    }
    Ok(seen)
}

fn resolve(set: &HashSet<&str>, name: &str, context: String) -> Result<(), ValidationError> {
    if set.contains(name) {
        Ok(())
    } else {
        Err(ValidationError::MissingReference {
            name: name.to_string(),
            context,
        })
    }
}

fn validate_leak(owner: &str, leak: &Option<LeakDef>) -> Result<(), ValidationError> {
    if let Some(leak) = leak {
        positive(format!("{owner}.leak.area_m2"), leak.area_m2)?;
        positive(format!("{owner}.leak.discharge_coeff"), leak.discharge_coeff)?;
    }
    Ok(())
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }
    if let Some(step) = project.pattern_timestep_s {
        positive("pattern_timestep_s".into(), step)?;
    }

    let patterns = unique(project.patterns.iter().map(|p| &p.name), "patterns")?;
    for p in &project.patterns {
        if p.multipliers.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("pattern '{}'", p.name),
                value: "[]".into(),
                reason: "needs at least one multiplier".into(),
            });
        }
        for m in &p.multipliers {
            non_negative(format!("pattern '{}' multiplier", p.name), *m)?;
        }
    }
    let curves = unique(project.curves.iter().map(|c| &c.name), "curves")?;

    let nodes = unique(
        project
            .junctions
            .iter()
            .map(|j| &j.name)
            .chain(project.tanks.iter().map(|t| &t.name))
            .chain(project.reservoirs.iter().map(|r| &r.name)),
        "nodes",
    )?;
    for j in &project.junctions {
        if !j.elevation_m.is_finite() || !j.demand_cms.is_finite() {
            return Err(invalid(format!("junction '{}'", j.name), j.demand_cms, "must be finite"));
        }
        if let Some(p) = &j.pattern {
            resolve(&patterns, p, format!("junction '{}' pattern", j.name))?;
        }
        validate_leak(&j.name, &j.leak)?;
    }
    for t in &project.tanks {
        positive(format!("tank '{}'.diameter_m", t.name), t.diameter_m)?;
        non_negative(format!("tank '{}'.min_level_m", t.name), t.min_level_m)?;
        if !(t.min_level_m <= t.init_level_m && t.init_level_m <= t.max_level_m) {
            return Err(invalid(
                format!("tank '{}'.init_level_m", t.name),
                t.init_level_m,
                "must lie between min and max level",
            ));
        }
        validate_leak(&t.name, &t.leak)?;
    }
    for r in &project.reservoirs {
        if let Some(p) = &r.pattern {
            resolve(&patterns, p, format!("reservoir '{}' pattern", r.name))?;
        }
    }

    unique(
        project
            .pipes
            .iter()
            .map(|p| &p.name)
            .chain(project.pumps.iter().map(|p| &p.name))
            .chain(project.valves.iter().map(|v| &v.name)),
        "links",
    )?;
    for p in &project.pipes {
        resolve(&nodes, &p.from, format!("pipe '{}' from", p.name))?;
        resolve(&nodes, &p.to, format!("pipe '{}' to", p.name))?;
        positive(format!("pipe '{}'.length_m", p.name), p.length_m)?;
        positive(format!("pipe '{}'.diameter_m", p.name), p.diameter_m)?;
        positive(format!("pipe '{}'.roughness", p.name), p.roughness)?;
        non_negative(format!("pipe '{}'.minor_loss", p.name), p.minor_loss)?;
    }
    for p in &project.pumps {
        resolve(&nodes, &p.from, format!("pump '{}' from", p.name))?;
        resolve(&nodes, &p.to, format!("pump '{}' to", p.name))?;
        match (&p.curve, p.power_kw) {
            (Some(curve), None) => resolve(&curves, curve, format!("pump '{}' curve", p.name))?,
            (None, Some(kw)) => positive(format!("pump '{}'.power_kw", p.name), kw)?,
            _ => {
                return Err(ValidationError::InvalidValue {
                    field: format!("pump '{}'", p.name),
                    value: "curve/power_kw".into(),
                    reason: "exactly one of curve or power_kw is required".into(),
                });
            }
        }
        if let Some(speed) = p.speed {
            positive(format!("pump '{}'.speed", p.name), speed)?;
        }
    }
    for v in &project.valves {
        resolve(&nodes, &v.from, format!("valve '{}' from", v.name))?;
        resolve(&nodes, &v.to, format!("valve '{}' to", v.name))?;
        positive(format!("valve '{}'.diameter_m", v.name), v.diameter_m)?;
        non_negative(format!("valve '{}'.setting", v.name), v.setting)?;
        non_negative(format!("valve '{}'.minor_loss", v.name), v.minor_loss)?;
    }

    unique(
        project
            .controls
            .iter()
            .map(|c| &c.name)
            .chain(project.rules.iter().map(|r| &r.name)),
        "controls and rules",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{JunctionDef, PipeDef, ReservoirDef};

    fn project() -> Project {
        let mut p = Project::new("test");
        p.reservoirs.push(ReservoirDef {
            name: "R1".into(),
            head_m: 100.0,
            pattern: None,
        });
        p.junctions.push(JunctionDef {
            name: "J1".into(),
            elevation_m: 50.0,
            demand_cms: 0.01,
            pattern: None,
            leak: None,
        });
        p.pipes.push(PipeDef {
            name: "P1".into(),
            from: "R1".into(),
            to: "J1".into(),
            length_m: 1000.0,
            diameter_m: 0.3,
            roughness: 100.0,
            minor_loss: 0.0,
            check_valve: false,
            status: None,
        });
        p
    }

    #[test]
    fn valid_project_passes() {
        validate_project(&project()).unwrap();
    }

    #[test]
    fn node_names_shared_across_kinds() {
        let mut p = project();
        p.reservoirs[0].name = "J1".into();
        p.pipes[0].from = "J1".into();
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn unknown_pipe_end_rejected() {
        let mut p = project();
        p.pipes[0].to = "J9".into();
        assert_eq!(
            validate_project(&p),
            Err(ValidationError::MissingReference {
                name: "J9".into(),
                context: "pipe 'P1' to".into(),
            })
        );
    }

    #[test]
    fn negative_diameter_rejected() {
        let mut p = project();
        p.pipes[0].diameter_m = -0.3;
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut p = project();
        p.version = LATEST_VERSION + 1;
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }
}
