//! Timestep driver.

use tracing::{debug, info, warn};
use wf_controls::{ControlContext, ControlEngine};
use wf_hydraulics::{HydraulicModel, check_statuses};
use wf_network::Network;
use wf_results::{ResultsTable, StepRecord};
use wf_solver::{NewtonConfig, NewtonReport, newton_solve};

use crate::error::{SimError, SimResult};
use crate::options::SimOptions;
use crate::sink::ResultSink;
use crate::tanks;

/// Times closer than this (s) are considered equal.
const TIME_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl SimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimState::NotStarted => "not started",
            SimState::Running => "running",
            SimState::Completed => "completed",
            SimState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SolveStats {
    iterations: usize,
    residual_norm: f64,
    attempts: usize,
}

/// Extended-period simulation of one network.
///
/// Each step evaluates controls, refreshes or rebuilds the equations, solves
/// them (re-solving after status checks), records the state and integrates
/// tank levels up to the next step time.
pub struct Simulator {
    network: Network,
    engine: ControlEngine,
    options: SimOptions,
    hydraulics: Option<HydraulicModel>,
    time_s: f64,
    steps: usize,
    state: SimState,
}

impl Simulator {
    pub fn new(network: Network, mut engine: ControlEngine, options: SimOptions) -> SimResult<Self> {
        options.validate()?;
        engine.check_references(&network)?;
        engine.set_policy(options.conflict_policy);
        Ok(Self {
            network,
            engine,
            options,
            hydraulics: None,
            time_s: 0.0,
            steps: 0,
            state: SimState::NotStarted,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn engine(&self) -> &ControlEngine {
        &self.engine
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// Time of the next step to be solved (s).
    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SimState::Completed | SimState::Failed)
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    /// Solve the current time and advance to the next one.
    pub fn step(&mut self) -> SimResult<StepRecord> {
        match self.state {
            SimState::Completed | SimState::Failed => {
                return Err(SimError::Finished {
                    state: self.state.as_str(),
                });
            }
            SimState::NotStarted => {
                info!(
                    duration_s = self.options.duration_s,
                    timestep_s = self.options.hydraulic_timestep_s,
                    nodes = self.network.node_count(),
                    links = self.network.link_count(),
                    "simulation started"
                );
                self.state = SimState::Running;
            }
            SimState::Running => {}
        }
        match self.advance() {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(time_s = self.time_s, error = %e, "simulation failed");
                self.state = SimState::Failed;
                Err(e)
            }
        }
    }

    /// Run to the end, collecting every step in memory.
    pub fn run(&mut self) -> SimResult<ResultsTable> {
        let mut table = ResultsTable::new();
        self.run_with_sink(&mut table)?;
        Ok(table)
    }

    /// Run to the end, handing each step to `sink`. Returns the number of
    /// records written.
    pub fn run_with_sink(&mut self, sink: &mut dyn ResultSink) -> SimResult<usize> {
        let mut recorded = 0;
        while !self.is_finished() {
            let record = self.step()?;
            if let Err(e) = sink.record(&record) {
                self.state = SimState::Failed;
                return Err(e);
            }
            recorded += 1;
        }
        Ok(recorded)
    }

    fn advance(&mut self) -> SimResult<StepRecord> {
        if self.steps >= self.options.max_steps {
            return Err(SimError::MaxStepsExceeded {
                max_steps: self.options.max_steps,
            });
        }
        let t = self.time_s;

        let ctx = ControlContext::new(&self.network, t, self.options.start_clock_s);
        let evaluation = self.engine.evaluate(&ctx)?;
        let applied = self.engine.apply(&evaluation.actions, &mut self.network)?;
        if applied.changed > 0 {
            debug!(
                time_s = t,
                changed = applied.changed,
                structural = applied.structural,
                "controls applied"
            );
        }

        let stats = self.solve(t)?;
        let mut record = StepRecord::capture(&self.network, t, stats.iterations, stats.residual_norm);
        record.attempts = stats.attempts;
        record.conflicts = evaluation.conflicts.len();
        self.steps += 1;

        match self.next_time(t) {
            Some(next) => {
                tanks::integrate_levels(&mut self.network, next - t)?;
                self.time_s = next;
            }
            None => {
                info!(steps = self.steps, "simulation completed");
                self.state = SimState::Completed;
            }
        }
        Ok(record)
    }

    /// Next step time: the earliest of the next hydraulic timestep boundary,
    /// a control event, a pattern step, a tank level crossing and the end.
    fn next_time(&self, t: f64) -> Option<f64> {
        let end = self.options.duration_s;
        if t >= end - TIME_EPS {
            return None;
        }
        let h = self.options.hydraulic_timestep_s;
        let mut next = (((t + TIME_EPS) / h).floor() + 1.0) * h;
        next = next.min(end);
        if let Some(event) = self
            .engine
            .next_event_time(t, self.options.start_clock_s)
            .filter(|e| *e > t + TIME_EPS)
        {
            next = next.min(event);
        }
        if let Some(dt) = self
            .network
            .time_to_next_pattern_step(t)
            .filter(|dt| *dt > TIME_EPS)
        {
            next = next.min(t + dt);
        }
        let thresholds = self.engine.level_thresholds();
        if let Some(dt) = tanks::time_to_level_crossing(&self.network, &thresholds) {
            next = next.min(t + dt);
        }
        Some(next)
    }

    /// Solve at `t`, re-solving while status checks change link statuses or
    /// flow-dependent resistances move.
    ///
    /// When the checks do not settle within the limit, pending status changes
    /// are undone so every link status matches the stored solution.
    fn solve(&mut self, t: f64) -> SimResult<SolveStats> {
        let mut stats = SolveStats {
            iterations: 0,
            residual_norm: 0.0,
            attempts: 1,
        };
        let max_checks = self.options.hydraulics.max_status_checks;
        for check in 0..=max_checks {
            let mut hydraulics = self.prepared_model(t)?;
            let (report, attempts) = self.solve_with_retry(&mut hydraulics, t)?;
            stats.iterations += report.iterations;
            stats.residual_norm = report.residual_norm;
            stats.attempts = stats.attempts.max(attempts);

            let tolerance = self.attempt_config(attempts).tolerance;
            let settled = hydraulics.resistances_settled(&self.network, tolerance)?;
            hydraulics.apply_solution(&mut self.network)?;
            self.hydraulics = Some(hydraulics);

            let changes = check_statuses(&mut self.network)?;
            if changes.is_empty() && settled {
                break;
            }
            if check == max_checks {
                for change in &changes {
                    self.network.set_solver_status(change.link, change.from)?;
                }
                warn!(
                    time_s = t,
                    pending = changes.len(),
                    resistances_settled = settled,
                    "status checks did not settle; keeping last solution"
                );
            }
        }
        Ok(stats)
    }

    /// The equation model for the current network, rebuilt only when the
    /// structure or the options changed.
    fn prepared_model(&mut self, t: f64) -> SimResult<HydraulicModel> {
        let options = &self.options.hydraulics;
        let model = match self.hydraulics.take() {
            Some(mut h) if !h.needs_rebuild(&self.network, options) => {
                h.refresh_parameters(&self.network, t)?;
                h
            }
            _ => {
                let h = HydraulicModel::build(&self.network, options, t)?;
                info!(
                    time_s = t,
                    version = self.network.structure_version(),
                    variables = h.model().num_variables(),
                    "built hydraulic equations"
                );
                h
            }
        };
        Ok(model)
    }

    fn attempt_config(&self, attempt: usize) -> NewtonConfig {
        let base = &self.options.newton;
        if attempt <= 2 {
            return base.clone();
        }
        let factor = self.options.retry.relax_factor.powi((attempt - 2) as i32);
        base.relaxed(factor)
    }

    /// Warm start, then cold start, then progressively relaxed tolerances.
    fn solve_with_retry(
        &self,
        hydraulics: &mut HydraulicModel,
        t: f64,
    ) -> SimResult<(NewtonReport, usize)> {
        let max_attempts = self.options.retry.max_attempts;
        let mut last = None;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                hydraulics.reset_initial_guess(&self.network)?;
            }
            let config = self.attempt_config(attempt);
            match newton_solve(hydraulics.model_mut(), &config) {
                Ok(report) => {
                    if attempt > 1 {
                        info!(time_s = t, attempt, "solve recovered on retry");
                    }
                    return Ok((report, attempt));
                }
                Err(e) if e.is_retryable() => {
                    warn!(time_s = t, attempt, error = %e, "hydraulic solve failed");
                    last = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        match last {
            Some(cause) => Err(SimError::StepFailed {
                time_s: t,
                attempts: max_attempts,
                cause,
            }),
            None => Err(SimError::InvalidArg {
                what: "retry policy needs at least one attempt",
            }),
        }
    }
}
