//! Workflow module - the batch normalization harness
//!
//! Structure:
//! - `workspace`: per-item scratch directories
//! - `toolkit`: the external imaging operations
//! - `pipeline`: three-stage executor for one item
//! - `placement`: atomic move of the finished file
//! - `dispatcher`: bounded worker pool
//! - `aggregator`: result tally
//! - `reporter`: progress hooks

pub mod aggregator;
pub mod dispatcher;
pub mod pipeline;
pub mod placement;
pub mod reporter;
pub mod toolkit;
pub mod workspace;

use log::{info, warn};
use std::{fs, sync::Arc};
use tokio::sync::broadcast;

use crate::{
    common::errors::RunResult,
    config::RunConfig,
    discovery::{find_inputs, plan_items},
    models::{RunSummary, WorkItem},
};
use dispatcher::Dispatcher;
use pipeline::PipelineExecutor;
use reporter::ProgressReporter;
use toolkit::Toolkit;
use workspace::WorkspaceManager;

/// Discover inputs and compute their output paths.
///
/// Fails only on run-level problems; an empty list is a valid outcome.
pub fn prepare_items(config: &RunConfig) -> RunResult<Vec<WorkItem>> {
    let inputs = find_inputs(&config.dataset, &config.suffix)?;
    if let Some(output) = &config.output {
        // Items retry this themselves, so a failure here is only worth a warning.
        if let Err(err) = fs::create_dir_all(output) {
            warn!("Failed to create output directory {:?}: {}", output, err);
        }
    }
    Ok(plan_items(inputs, config.output.as_deref()))
}

pub fn build_dispatcher(config: &RunConfig, toolkit: Arc<dyn Toolkit>) -> Dispatcher {
    let executor = PipelineExecutor::new(
        toolkit,
        WorkspaceManager::new(&config.scratch_dir),
        config.orientation,
    );
    Dispatcher::new(executor, config.jobs)
}

/// Discover, dispatch and summarize in one call.
pub async fn run_batch(
    config: &RunConfig,
    toolkit: Arc<dyn Toolkit>,
    reporter: &mut dyn ProgressReporter,
    shutdown: Option<broadcast::Receiver<()>>,
) -> RunResult<RunSummary> {
    let items = prepare_items(config)?;
    if items.is_empty() {
        info!("No files matching *{} in {:?}", config.suffix, config.dataset);
    }

    let mut dispatcher = build_dispatcher(config, toolkit);
    if let Some(shutdown) = shutdown {
        dispatcher = dispatcher.with_shutdown(shutdown);
    }
    Ok(dispatcher.process_all(items, reporter).await)
}
