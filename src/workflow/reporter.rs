use crate::models::{RunSummary, WorkResult};

/// Receives completion events from the dispatcher.
///
/// All calls come from the single task that drives the run, in completion
/// order. Nothing here may assume results arrive in submission order.
pub trait ProgressReporter: Send {
    fn on_run_start(&mut self, _total: usize) {}

    fn on_item_complete(&mut self, result: &WorkResult);

    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Reporter for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_item_complete(&mut self, _result: &WorkResult) {}

    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

/// Keeps every event it sees.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    pub started_with: Option<usize>,
    pub completed: Vec<WorkResult>,
    pub summary: Option<RunSummary>,
}

impl ProgressReporter for RecordingReporter {
    fn on_run_start(&mut self, total: usize) {
        self.started_with = Some(total);
    }

    fn on_item_complete(&mut self, result: &WorkResult) {
        self.completed.push(result.clone());
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        self.summary = Some(summary.clone());
    }
}
