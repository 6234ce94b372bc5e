//! In-memory results with per-element series queries.

use serde::{Deserialize, Serialize};
use wf_network::{LinkAttribute, NodeAttribute};

use crate::types::{LinkSnapshot, NodeSnapshot, StepRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    records: Vec<StepRecord>,
}

/// Aggregate figures for a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: usize,
    pub start_s: f64,
    pub end_s: f64,
    pub total_iterations: usize,
    pub max_iterations: usize,
    pub max_residual_norm: f64,
    /// Steps that needed more than one solve attempt
    pub retried_steps: usize,
    pub conflicts: usize,
}

fn node_value(n: &NodeSnapshot, attr: NodeAttribute) -> Option<f64> {
    match attr {
        NodeAttribute::Head => Some(n.head_m),
        NodeAttribute::Pressure => Some(n.pressure_m),
        NodeAttribute::Demand => Some(n.demand_cms),
        NodeAttribute::Level => n.level_m,
    }
}

fn link_value(l: &LinkSnapshot, attr: LinkAttribute) -> Option<f64> {
    match attr {
        LinkAttribute::Flow => Some(l.flow_cms),
        LinkAttribute::Velocity => l.velocity_ms,
        LinkAttribute::Status => Some(l.status.as_number()),
        LinkAttribute::Setting => Some(l.setting),
    }
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time_s).collect()
    }

    /// `(time, value)` pairs for one node attribute. Steps where the node is
    /// absent or the attribute does not apply are skipped.
    pub fn node_series(&self, name: &str, attr: NodeAttribute) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|r| {
                let v = r.node(name).and_then(|n| node_value(n, attr))?;
                Some((r.time_s, v))
            })
            .collect()
    }

    pub fn link_series(&self, name: &str, attr: LinkAttribute) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|r| {
                let v = r.link(name).and_then(|l| link_value(l, attr))?;
                Some((r.time_s, v))
            })
            .collect()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        let mut summary = RunSummary {
            steps: self.records.len(),
            start_s: first.time_s,
            end_s: last.time_s,
            total_iterations: 0,
            max_iterations: 0,
            max_residual_norm: 0.0,
            retried_steps: 0,
            conflicts: 0,
        };
        for r in &self.records {
            summary.total_iterations += r.iterations;
            summary.max_iterations = summary.max_iterations.max(r.iterations);
            summary.max_residual_norm = summary.max_residual_norm.max(r.residual_norm);
            summary.conflicts += r.conflicts;
            if r.attempts > 1 {
                summary.retried_steps += 1;
            }
        }
        Some(summary)
    }
}

impl From<Vec<StepRecord>> for ResultsTable {
    fn from(records: Vec<StepRecord>) -> Self {
        Self { records }
    }
}
