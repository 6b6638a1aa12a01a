use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::models::{RunSummary, WorkResult};

/// Running tally of completed items. Owned by the dispatching task only.
#[derive(Debug)]
pub struct Aggregator {
    total: usize,
    succeeded: usize,
    failed: usize,
    errors: Vec<WorkResult>,
    started_at: DateTime<Utc>,
    start_time: Instant,
}

impl Aggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            start_time: Instant::now(),
        }
    }

    pub fn record(&mut self, result: WorkResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            self.errors.push(result);
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Items not yet recorded count as never attempted.
    pub fn finish(self) -> RunSummary {
        RunSummary {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            not_attempted: self.total.saturating_sub(self.succeeded + self.failed),
            errors: self.errors,
            started_at: self.started_at,
            elapsed: self.start_time.elapsed(),
        }
    }
}
