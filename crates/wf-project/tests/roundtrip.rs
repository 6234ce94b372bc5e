use wf_controls::{Condition, Control, ControlAction};
use wf_network::LinkStatus;
use wf_project::*;

fn small_project() -> Project {
    let mut project = Project::new("Round trip");
    project.reservoirs.push(ReservoirDef {
        name: "R1".into(),
        head_m: 100.0,
        pattern: None,
    });
    project.junctions.push(JunctionDef {
        name: "J1".into(),
        elevation_m: 50.0,
        demand_cms: 0.01,
        pattern: None,
        leak: Some(LeakDef {
            area_m2: 1e-4,
            discharge_coeff: 0.75,
        }),
    });
    project.pipes.push(PipeDef {
        name: "P1".into(),
        from: "R1".into(),
        to: "J1".into(),
        length_m: 1000.0,
        diameter_m: 0.3,
        roughness: 100.0,
        minor_loss: 0.5,
        check_valve: false,
        status: None,
    });
    project.controls.push(Control::new(
        "close-at-noon",
        Condition::at_time(43_200.0),
        ControlAction::status("P1", LinkStatus::Closed),
    ));
    project
}

#[test]
fn roundtrip_yaml() {
    let project = small_project();
    let path = std::env::temp_dir().join("wf_project_roundtrip.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load(&path).unwrap();
    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json() {
    let project = small_project();
    let path = std::env::temp_dir().join("wf_project_roundtrip.json");
    save_json(&path, &project).unwrap();
    let loaded = load(&path).unwrap();
    assert_eq!(project, loaded);
}

#[test]
fn unknown_extension_rejected() {
    let err = load(std::path::Path::new("network.inp")).unwrap_err();
    assert!(matches!(err, ProjectError::UnknownFormat { .. }));
}

#[test]
fn defaults_fill_omitted_fields() {
    let project = from_yaml_str(
        "version: 1\nname: bare\nreservoirs:\n  - { name: R1, head_m: 10 }\n",
    )
    .unwrap();
    assert_eq!(project.options.hydraulic_timestep_s, 3600.0);
    assert!(project.pipes.is_empty());
    let compiled = compile(&project).unwrap();
    assert_eq!(compiled.network.node_count(), 1);
}
