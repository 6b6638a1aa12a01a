//! Setup/initialization module - handles application startup tasks
//!
//! Includes:
//! - Logger initialization
//! - AFNI availability check

use anstyle::{AnsiColor, Style};
use env_logger::{Builder, WriteStyle};
use log::{error, info, kv::Key};
use std::io::{IsTerminal, Write};

use crate::cli::progress::ACTIVE_BAR;
use crate::workflow::toolkit::AfniToolkit;

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

/// Writes to stderr, pausing the active progress bar so lines don't tear.
pub struct BarAwareStderr;

impl Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bar = ACTIVE_BAR.lock().ok().and_then(|guard| guard.clone());
        match bar {
            Some(bar) => bar.suspend(|| std::io::stderr().write_all(buf))?,
            None => std::io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

/// Initialize the global logger. `RUST_LOG` overrides the defaults.
pub fn initialize_logger(verbose: bool) {
    let color = std::io::stderr().is_terminal();
    let grey = if color {
        Style::new().fg_color(Some(AnsiColor::BrightBlack.into()))
    } else {
        Style::new()
    };
    let cyan = if color {
        Style::new().fg_color(Some(AnsiColor::Cyan.into()))
    } else {
        Style::new()
    };

    let mut builder = Builder::new();
    builder
        .write_style(if color {
            WriteStyle::Always
        } else {
            WriteStyle::Never
        })
        .format(move |buf, record| {
            let ts = buf.timestamp();
            let level_style = buf.default_level_style(record.level());

            let dur_raw = record
                .key_values()
                .get(Key::from("duration"))
                .map(|v| v.to_string())
                .unwrap_or_default();
            let dur = if dur_raw.is_empty() {
                " ".repeat(10)
            } else {
                format!("{cyan}{:>10}{cyan:#}", dur_raw)
            };

            writeln!(
                buf,
                "{grey}{ts}{grey:#} {level_style}{}{level_style:#} {grey}{}{grey:#}",
                record.level(),
                record.target()
            )?;

            let message = format!("{}", record.args());
            let subsequent_indent = " ".repeat(11);
            let mut lines = message.lines();
            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}", dur, first_line)?;
            }
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }
            Ok(())
        })
        .target(env_logger::Target::Pipe(Box::new(BarAwareStderr)))
        .filter(None, log::LevelFilter::Info);

    if verbose {
        builder.filter(Some("nifti_normalize"), log::LevelFilter::Debug);
    }

    builder.parse_env("RUST_LOG").init();
}

// ────────────────────────────────────────────────────────────────
// AFNI Check
// ────────────────────────────────────────────────────────────────

/// Log the version of each AFNI program, or why it is unusable.
/// Returns whether all of them answered.
pub fn check_afni(toolkit: &AfniToolkit) -> bool {
    let mut all_available = true;
    for (program, result) in toolkit.probe() {
        match result {
            Ok(version) => info!("{} version: {}", program, version),
            Err(err) => {
                all_available = false;
                error!("{:#}. Affected files will fail.", err);
            }
        }
    }
    all_available
}
