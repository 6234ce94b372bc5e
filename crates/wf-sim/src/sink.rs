//! Destinations for step records.

use wf_results::{JsonlWriter, ResultsTable, StepRecord};

use crate::error::SimResult;

/// Receives each step record as soon as the step completes.
pub trait ResultSink {
    fn record(&mut self, record: &StepRecord) -> SimResult<()>;
}

impl ResultSink for ResultsTable {
    fn record(&mut self, record: &StepRecord) -> SimResult<()> {
        self.push(record.clone());
        Ok(())
    }
}

impl ResultSink for Vec<StepRecord> {
    fn record(&mut self, record: &StepRecord) -> SimResult<()> {
        self.push(record.clone());
        Ok(())
    }
}

impl ResultSink for JsonlWriter {
    fn record(&mut self, record: &StepRecord) -> SimResult<()> {
        self.append(record)?;
        Ok(())
    }
}
