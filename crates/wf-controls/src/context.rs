//! Read-only state handed to condition evaluation.

use wf_core::units::constants::SECONDS_PER_DAY;
use wf_network::Network;

/// Snapshot of what conditions may read: the network and the clock.
#[derive(Debug, Clone, Copy)]
pub struct ControlContext<'a> {
    pub network: &'a Network,
    /// Elapsed simulation time (s)
    pub time_s: f64,
    /// Clock time of day at simulation start (s after midnight)
    pub start_clock_s: f64,
}

impl<'a> ControlContext<'a> {
    pub fn new(network: &'a Network, time_s: f64, start_clock_s: f64) -> Self {
        Self {
            network,
            time_s,
            start_clock_s,
        }
    }

    /// Absolute clock time since midnight of the first day (s).
    pub fn clock_s(&self) -> f64 {
        self.start_clock_s + self.time_s
    }

    /// Clock time within the current day, in `[0, 86400)`.
    pub fn time_of_day_s(&self) -> f64 {
        self.clock_s().rem_euclid(SECONDS_PER_DAY)
    }
}
