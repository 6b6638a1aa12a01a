//! Dispatcher - bounded worker pool over the pipeline executor
//!
//! Includes:
//! - At most `concurrency` items on the blocking pool at once
//! - Completion-order result handling through the aggregator and reporter
//! - Panic containment: a crashed unit becomes a `WorkerFault` result
//! - Graceful shutdown: stop dispatching, drain in-flight items

use log::{debug, info, warn};
use std::{
    any::Any,
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    path::PathBuf,
};
use tokio::{
    sync::broadcast::{
        self,
        error::{RecvError, TryRecvError},
    },
    task::JoinSet,
};

use crate::{
    models::{FailureKind, RunSummary, WorkItem, WorkResult},
    workflow::{aggregator::Aggregator, pipeline::PipelineExecutor, reporter::ProgressReporter},
};

pub struct Dispatcher {
    executor: PipelineExecutor,
    concurrency: usize,
    shutdown: Option<broadcast::Receiver<()>>,
}

impl Dispatcher {
    pub fn new(executor: PipelineExecutor, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency,
            shutdown: None,
        }
    }

    /// Stop dispatching new items once a message arrives on `shutdown`.
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run every item to a terminal state and summarize.
    ///
    /// Each dispatched item is reported exactly once. Items still pending
    /// when a shutdown arrives are counted as not attempted.
    pub async fn process_all(
        &mut self,
        items: Vec<WorkItem>,
        reporter: &mut dyn ProgressReporter,
    ) -> RunSummary {
        let total = items.len();
        let slots = effective_concurrency(self.concurrency, total);
        let mut aggregator = Aggregator::new(total);
        reporter.on_run_start(total);
        info!("Dispatching {} items across {} workers", total, slots);

        let mut pending = items.into_iter().enumerate();
        let mut running: JoinSet<(usize, WorkResult)> = JoinSet::new();
        let mut in_flight: HashMap<usize, PathBuf> = HashMap::new();
        let mut stopping = false;

        loop {
            if !stopping && self.shutdown_pending() {
                stopping = true;
                log_shutdown(running.len(), pending.len());
            }

            while !stopping && running.len() < slots {
                let Some((index, item)) = pending.next() else {
                    break;
                };
                in_flight.insert(index, item.input_path().to_path_buf());
                let executor = self.executor.clone();
                running.spawn_blocking(move || (index, run_contained(&executor, item)));
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                joined = running.join_next() => match joined {
                    Some(Ok((index, result))) => {
                        in_flight.remove(&index);
                        reporter.on_item_complete(&result);
                        aggregator.record(result);
                    }
                    Some(Err(err)) => {
                        // Identity of the unit is unknown here; it stays in
                        // `in_flight` and is resolved after the loop.
                        warn!("Worker terminated without a result: {}", err);
                    }
                    None => break,
                },
                _ = shutdown_requested(&mut self.shutdown), if !stopping => {
                    stopping = true;
                    log_shutdown(running.len(), pending.len());
                }
            }
        }

        for result in lost_results(in_flight) {
            reporter.on_item_complete(&result);
            aggregator.record(result);
        }

        let summary = aggregator.finish();
        debug!(
            "Run finished: {} succeeded, {} failed, {} not attempted",
            summary.succeeded, summary.failed, summary.not_attempted
        );
        reporter.on_run_complete(&summary);
        summary
    }

    fn shutdown_pending(&mut self) -> bool {
        match self.shutdown.as_mut().map(|rx| rx.try_recv()) {
            Some(Ok(())) | Some(Err(TryRecvError::Lagged(_))) => true,
            _ => false,
        }
    }
}

fn log_shutdown(in_flight: usize, skipped: usize) {
    warn!(
        "Shutdown requested; waiting for {} in-flight items, {} will not be attempted",
        in_flight, skipped
    );
}

/// Worker faults for items that were dispatched but never reported.
///
/// `run_contained` already turns panics into results, so this only sees
/// tasks whose `JoinError` escaped it (a panic while unwinding, or a task
/// cancelled by the runtime).
fn lost_results(in_flight: HashMap<usize, PathBuf>) -> Vec<WorkResult> {
    let mut lost: Vec<_> = in_flight.into_iter().collect();
    lost.sort_by_key(|(index, _)| *index);
    lost.into_iter()
        .map(|(_, input)| {
            WorkResult::error(
                input,
                FailureKind::WorkerFault,
                "worker terminated before reporting a result",
            )
        })
        .collect()
}

/// Requested concurrency clamped to `1..=total`.
pub fn effective_concurrency(requested: usize, total: usize) -> usize {
    requested.clamp(1, total.max(1))
}

/// Run one item; a panic anywhere below becomes an error result.
fn run_contained(executor: &PipelineExecutor, item: WorkItem) -> WorkResult {
    match catch_unwind(AssertUnwindSafe(|| executor.run(&item))) {
        Ok(result) => result,
        Err(payload) => {
            let message = format!("worker crashed: {}", panic_message(payload.as_ref()));
            warn!("{:?}: {}", item.input_path(), message);
            WorkResult::error(item.input_path(), FailureKind::WorkerFault, message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn shutdown_requested(shutdown: &mut Option<broadcast::Receiver<()>>) {
    match shutdown {
        Some(rx) => match rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {}
            // All senders gone: nobody can ask for a shutdown any more.
            Err(RecvError::Closed) => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}
