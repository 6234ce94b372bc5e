use std::path::{Path, PathBuf};

use wf_network::{LinkAttribute, LinkStatus, NodeAttribute};

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/networks")
        .join(name)
}

#[test]
fn demos_load_and_compile() {
    for name in ["filling_tank.yaml", "pumped_zone.yaml"] {
        let project = wf_project::load(&demo(name))
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        wf_project::compile(&project)
            .unwrap_or_else(|e| panic!("Failed to compile {}: {}", name, e));
    }
}

#[test]
fn filling_tank_closes_inlet_once() {
    let project = wf_project::load(&demo("filling_tank.yaml")).unwrap();
    let mut sim = wf_project::compile(&project)
        .unwrap()
        .into_simulator()
        .unwrap();
    let table = sim.run().unwrap();

    let mut statuses: Vec<f64> = table
        .link_series("P1", LinkAttribute::Status)
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    statuses.dedup();
    assert_eq!(statuses, vec![1.0, 0.0]);

    let levels = table.node_series("T1", NodeAttribute::Level);
    let peak = levels.iter().map(|(_, l)| *l).fold(f64::MIN, f64::max);
    assert!(peak > 4.0 && peak < 6.0, "peak level {peak}");
    assert_eq!(table.last().unwrap().time_s, 86_400.0);
}

#[test]
fn pump_runs_only_during_the_day() {
    let project = wf_project::load(&demo("pumped_zone.yaml")).unwrap();
    let mut sim = wf_project::compile(&project)
        .unwrap()
        .into_simulator()
        .unwrap();
    let table = sim.run().unwrap();

    for record in table.records() {
        let pump = record.link("PU1").unwrap();
        let day = (21_600.0..79_200.0).contains(&record.time_s);
        if day {
            assert_eq!(pump.status, LinkStatus::Open, "t = {}", record.time_s);
            assert!(pump.flow_cms > 1e-3);
        } else {
            assert_eq!(pump.flow_cms, 0.0, "t = {}", record.time_s);
        }
    }
}
