//! Independent scenarios run in parallel.

use rayon::prelude::*;
use tracing::info;
use wf_controls::ControlEngine;
use wf_network::Network;
use wf_results::ResultsTable;

use crate::error::SimResult;
use crate::options::SimOptions;
use crate::sim::Simulator;

/// One member of an ensemble; owns all of its state.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub network: Network,
    pub controls: ControlEngine,
    pub options: SimOptions,
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: String,
    pub result: SimResult<ResultsTable>,
}

/// Run every scenario on the rayon pool. Outcomes keep the input order.
pub fn run_ensemble(scenarios: Vec<Scenario>) -> Vec<ScenarioOutcome> {
    scenarios
        .into_par_iter()
        .map(|scenario| {
            let Scenario {
                name,
                network,
                controls,
                options,
            } = scenario;
            let result = Simulator::new(network, controls, options).and_then(|mut sim| sim.run());
            info!(scenario = %name, ok = result.is_ok(), "scenario finished");
            ScenarioOutcome { name, result }
        })
        .collect()
}
