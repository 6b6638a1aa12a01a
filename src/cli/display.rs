//! Terminal panels - header, pre-run summary and results
//!
//! Rendering is split from printing so the layout can be tested without a
//! terminal. Error messages are truncated here and nowhere else.

use anstyle::{AnsiColor, Style};
use std::{
    io::{IsTerminal, stdout},
    time::Duration,
};

use crate::{
    common::{ERROR_DISPLAY_LIMIT, ERROR_MESSAGE_PREVIEW},
    config::RunConfig,
    models::{RunSummary, WorkResult},
};

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub title: Style,
    pub key: Style,
    pub value: Style,
    pub good: Style,
    pub bad: Style,
    pub warn: Style,
    pub dim: Style,
}

impl Palette {
    pub fn detect() -> Self {
        if stdout().is_terminal() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        let fg = |c: AnsiColor| Style::new().fg_color(Some(c.into()));
        Self {
            title: fg(AnsiColor::Magenta).bold(),
            key: fg(AnsiColor::Cyan),
            value: fg(AnsiColor::Green),
            good: fg(AnsiColor::Green).bold(),
            bad: fg(AnsiColor::Red).bold(),
            warn: fg(AnsiColor::Yellow),
            dim: Style::new().dimmed(),
        }
    }

    pub fn plain() -> Self {
        Self {
            title: Style::new(),
            key: Style::new(),
            value: Style::new(),
            good: Style::new(),
            bad: Style::new(),
            warn: Style::new(),
            dim: Style::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Panel Drawing
// ────────────────────────────────────────────────────────────────

/// A row is (visible text, style). Width is measured on the visible text.
fn panel(title: &str, rows: &[(String, Style)], border: Style) -> String {
    let width = rows
        .iter()
        .map(|(text, _)| text.chars().count())
        .chain(std::iter::once(title.chars().count() + 2))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let top_fill = "─".repeat(width - title.chars().count() - 1);
    out.push_str(&format!("{border}╭─ {title} {top_fill}╮{border:#}\n"));
    for (text, style) in rows {
        let pad = " ".repeat(width - text.chars().count());
        out.push_str(&format!(
            "{border}│{border:#} {style}{text}{style:#}{pad} {border}│{border:#}\n"
        ));
    }
    out.push_str(&format!("{border}╰{}╯{border:#}\n", "─".repeat(width + 2)));
    out
}

// ────────────────────────────────────────────────────────────────
// Header & Pre-run Summary
// ────────────────────────────────────────────────────────────────

pub fn render_header(palette: &Palette) -> String {
    panel(
        "nifti-normalize",
        &[
            ("NIfTI Header Correction Tool".to_string(), palette.title),
            (
                "4D→3D extraction, deobliquing and reorientation".to_string(),
                palette.dim,
            ),
        ],
        palette.key,
    )
}

pub fn render_run_plan(config: &RunConfig, files_found: usize, palette: &Palette) -> String {
    let rows = [
        ("Dataset Path", config.dataset.display().to_string()),
        ("Files Found", files_found.to_string()),
        ("Target Orientation", config.orientation.to_string()),
        ("Parallel Jobs", config.jobs.to_string()),
        ("Output Mode", config.output_mode()),
    ];
    let rows: Vec<_> = rows
        .into_iter()
        .map(|(key, value)| (format!("{:<20}{}", key, value), palette.value))
        .collect();
    panel("Processing Summary", &rows, palette.good)
}

// ────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────

/// Keep at most `limit` characters, marking the cut with `...`.
pub fn truncate_message(message: &str, limit: usize) -> String {
    if message.chars().count() > limit {
        let head: String = message.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}

fn error_line(result: &WorkResult) -> String {
    let message = result.error_message().unwrap_or_default();
    // Multi-line toolkit output would break the panel.
    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "• {}: {}",
        result.file_name(),
        truncate_message(&message, ERROR_MESSAGE_PREVIEW)
    )
}

pub fn render_results(summary: &RunSummary, palette: &Palette) -> String {
    let mut rows = vec![
        (format!("{:<16}{:>8}", "Successful", summary.succeeded), palette.good),
        (format!("{:<16}{:>8}", "Failed", summary.failed), palette.bad),
    ];
    if summary.not_attempted > 0 {
        rows.push((
            format!("{:<16}{:>8}", "Not attempted", summary.not_attempted),
            palette.warn,
        ));
    }
    rows.push((format!("{:<16}{:>8}", "Total", summary.total), palette.key));
    let mut out = panel("Processing Results", &rows, palette.key);

    if !summary.errors.is_empty() {
        let lines: Vec<_> = summary
            .errors
            .iter()
            .take(ERROR_DISPLAY_LIMIT)
            .map(|result| (error_line(result), Style::new()))
            .collect();
        out.push('\n');
        out.push_str(&panel(
            &format!("Errors ({} total)", summary.errors.len()),
            &lines,
            palette.bad,
        ));
        if summary.errors.len() > ERROR_DISPLAY_LIMIT {
            let dim = palette.dim;
            out.push_str(&format!(
                "{dim}... and {} more errors{dim:#}\n",
                summary.errors.len() - ERROR_DISPLAY_LIMIT
            ));
        }
    }
    out
}

pub fn render_elapsed(elapsed: Duration, palette: &Palette) -> String {
    let dim = palette.dim;
    format!(
        "{dim}Total processing time: {:.1} seconds{dim:#}",
        elapsed.as_secs_f64()
    )
}

pub fn print_header(palette: &Palette) {
    println!("{}", render_header(palette));
}

pub fn print_run_plan(config: &RunConfig, files_found: usize, palette: &Palette) {
    println!("{}", render_run_plan(config, files_found, palette));
}

pub fn print_results(summary: &RunSummary, palette: &Palette) {
    println!();
    print!("{}", render_results(summary, palette));
    println!();
    println!("{}", render_elapsed(summary.elapsed, palette));
}
