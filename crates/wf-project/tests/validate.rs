use wf_controls::{Condition, Control, ControlAction};
use wf_network::LinkStatus;
use wf_project::*;

fn base() -> Project {
    from_yaml_str(
        r#"
version: 1
name: base
reservoirs:
  - { name: R1, head_m: 100 }
junctions:
  - { name: J1, elevation_m: 50, demand_cms: 0.01 }
pipes:
  - { name: P1, from: R1, to: J1, length_m: 1000, diameter_m: 0.3, roughness: 100 }
"#,
    )
    .unwrap()
}

#[test]
fn duplicate_link_names_rejected() {
    let mut project = base();
    let mut dup = project.pipes[0].clone();
    dup.diameter_m = 0.2;
    project.pipes.push(dup);
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::DuplicateName { ref name, .. }) if name == "P1"
    ));
}

#[test]
fn missing_pattern_rejected() {
    let mut project = base();
    project.junctions[0].pattern = Some("weekday".into());
    assert!(matches!(
        compile(&project),
        Err(ProjectError::Validation(ValidationError::MissingReference { ref name, .. }))
            if name == "weekday"
    ));
}

#[test]
fn pump_needs_exactly_one_model() {
    let mut project = base();
    project.curves.push(CurveDef {
        name: "C1".into(),
        points: vec![[0.05, 30.0]],
    });
    project.pumps.push(PumpDef {
        name: "PU1".into(),
        from: "R1".into(),
        to: "J1".into(),
        curve: Some("C1".into()),
        power_kw: Some(10.0),
        speed: None,
        status: None,
    });
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));
    project.pumps[0].power_kw = None;
    validate_project(&project).unwrap();
}

#[test]
fn control_on_unknown_link_fails_compile() {
    let mut project = base();
    project.controls.push(Control::new(
        "close-ghost",
        Condition::at_time(0.0),
        ControlAction::status("P9", LinkStatus::Closed),
    ));
    validate_project(&project).unwrap();
    assert!(matches!(compile(&project), Err(ProjectError::Control(_))));
}

#[test]
fn control_and_rule_share_name_space() {
    let mut project = base();
    project.controls.push(Control::new(
        "shutdown",
        Condition::at_time(0.0),
        ControlAction::status("P1", LinkStatus::Closed),
    ));
    project
        .rules
        .push(wf_controls::Rule::new("shutdown", Condition::at_time(10.0)));
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::DuplicateName { .. })
    ));
}

#[test]
fn tank_level_outside_range_rejected() {
    let mut project = base();
    project.tanks.push(TankDef {
        name: "T1".into(),
        elevation_m: 50.0,
        init_level_m: 7.0,
        min_level_m: 0.0,
        max_level_m: 6.0,
        diameter_m: 10.0,
        leak: None,
    });
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));
}
