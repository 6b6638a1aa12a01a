use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::{process::ExitCode, sync::Arc};
use tokio::sync::broadcast;

use nifti_normalize::{
    bootstrap::setup::{check_afni, initialize_logger},
    cli::{
        args::Args,
        display::{Palette, print_header, print_results, print_run_plan},
        progress::BarReporter,
        prompt::confirm,
    },
    common::{build_batch_runtime, errors::RunError},
    config::EnvOverrides,
    workflow::{build_dispatcher, prepare_items, toolkit::AfniToolkit},
};

fn main() -> ExitCode {
    let args = Args::parse();
    initialize_logger(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let palette = Palette::detect();
    print_header(&palette);

    let no_confirm = args.no_confirm;
    let report_path = args.report.clone();
    let config = args.into_config(EnvOverrides::load()?)?;

    let items = prepare_items(&config)?;
    if items.is_empty() {
        let warn_style = palette.warn;
        println!(
            "{warn_style}No files matching *{} found in {}{warn_style:#}",
            config.suffix,
            config.dataset.display()
        );
        return Ok(());
    }

    print_run_plan(&config, items.len(), &palette);

    if !no_confirm {
        let question = format!(
            "Proceed with processing {} files to {} orientation?",
            items.len(),
            config.orientation
        );
        if !confirm(&question).context("failed to read confirmation")? {
            println!("Operation cancelled.");
            return Ok(());
        }
        println!();
    }

    let toolkit = AfniToolkit::new(config.afni_bin.clone());
    check_afni(&toolkit);

    let runtime = build_batch_runtime(config.jobs).map_err(RunError::Runtime)?;
    let total = items.len();
    let summary = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let interrupt_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight files. Press Ctrl-C again to abort.");
                let _ = shutdown_tx.send(());
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                error!("Aborted; workspaces of in-flight files may be left behind");
                std::process::exit(130);
            }
        });

        let mut reporter = BarReporter::new(format!("Processing {} files", total));
        let summary = build_dispatcher(&config, Arc::new(toolkit))
            .with_shutdown(shutdown_rx)
            .process_all(items, &mut reporter)
            .await;

        interrupt_handle.abort();
        summary
    });

    print_results(&summary, &palette);

    if let Some(path) = report_path {
        summary.write_json(&path)?;
        info!("Wrote run report to {:?}", path);
    }
    Ok(())
}
