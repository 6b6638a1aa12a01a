use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::{
    sync::{LazyLock, Mutex},
    time::Duration,
};

use crate::models::{RunSummary, WorkResult};
use crate::workflow::reporter::ProgressReporter;

/// Bar currently on screen; the logger suspends it while writing.
pub static ACTIVE_BAR: LazyLock<Mutex<Option<ProgressBar>>> = LazyLock::new(|| Mutex::new(None));

const TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} • {elapsed_precise} • eta {eta}";

/// Terminal progress bar advanced once per finished file.
pub struct BarReporter {
    bar: ProgressBar,
    label: String,
    failed: u64,
}

impl BarReporter {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_target(label, ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_target("", ProgressDrawTarget::hidden())
    }

    fn with_target(label: impl Into<String>, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        let label = label.into();
        bar.set_message(label.clone());
        Self {
            bar,
            label,
            failed: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn detach(&self) {
        if let Ok(mut active) = ACTIVE_BAR.lock() {
            *active = None;
        }
    }
}

impl ProgressReporter for BarReporter {
    fn on_run_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut active) = ACTIVE_BAR.lock() {
            *active = Some(self.bar.clone());
        }
    }

    fn on_item_complete(&mut self, result: &WorkResult) {
        if !result.is_success() {
            self.failed += 1;
            self.bar
                .set_message(format!("{} ({} failed)", self.label, self.failed));
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&mut self, _summary: &RunSummary) {
        self.bar.finish();
        self.detach();
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        self.detach();
    }
}
