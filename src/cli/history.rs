// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! History command - inspect and clear recorded runs

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use super::HistoryAction;
use crate::errors::TagflowError;
use crate::history::{FilesystemHistory, HistoryStore, RunRecord};
use crate::params::{ParamOverrides, Parameters};
use crate::pipeline::{RunStatus, StageStatus};

/// Run the history command
pub async fn run(action: HistoryAction, config: Option<PathBuf>, verbose: bool) -> Result<()> {
    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let params = Parameters::load(config.as_deref(), ParamOverrides::default())?;
    let history_dir = working_dir.join(&params.history.directory);
    let history = FilesystemHistory::open(history_dir.clone(), params.history.keep);

    match action {
        HistoryAction::List => {
            let runs = history.list().await?;

            println!("{}", "Recent Runs".bold());
            println!("{}", "═".repeat(40));

            if runs.is_empty() {
                println!("{}", "  No recorded runs.".dimmed());
                return Ok(());
            }

            for run in &runs {
                let age = run
                    .started_at
                    .elapsed()
                    .map(|d| format!("{} ago", format_duration(d)))
                    .unwrap_or_default();

                println!(
                    "  {} {:<20} {:>8}  {}",
                    status_marker(&run.status),
                    run.display_label,
                    format_duration(Duration::from_millis(run.duration_ms)),
                    age.dimmed()
                );

                if let RunStatus::Failure { stage, exit_code, .. } = &run.status {
                    println!(
                        "      {}",
                        format!("{} failed (exit {})", stage.name(), exit_code).dimmed()
                    );
                }
            }

            if verbose {
                println!();
                println!("  Location: {}", history_dir.display());
            }

            Ok(())
        }

        HistoryAction::Show { build } => {
            let run = history
                .get(build)
                .await?
                .ok_or(TagflowError::RunNotFound { build_number: build })?;

            print_run(&run);
            Ok(())
        }

        HistoryAction::Clear { yes } => {
            let runs = history.list().await?;

            if runs.is_empty() {
                println!("{}", "History is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!("Delete {} recorded runs? [y/N] ", runs.len());
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            let removed = history.clear().await?;
            println!("{}", format!("Removed {} run(s).", removed).green());

            Ok(())
        }
    }
}

fn print_run(run: &RunRecord) {
    println!("{} {}", "Run".bold(), run.display_label.bold());
    println!("{}", "═".repeat(40));
    println!("  Status:   {} {}", status_marker(&run.status), run.status_label());
    println!(
        "  Duration: {}",
        format_duration(Duration::from_millis(run.duration_ms))
    );
    if let Some(ref commit) = run.commit {
        println!("  Commit:   {}", commit);
    }
    if let RunStatus::Failure { message, .. } = &run.status {
        println!("  Error:    {}", message.red());
    }

    if let Some(ref refs) = run.image_refs {
        println!();
        println!("{}:", "Images".bold());
        for reference in refs.all() {
            println!("  - {}", reference);
        }
    }

    if !run.stages.is_empty() {
        println!();
        println!("{}:", "Stages".bold());
        for report in &run.stages {
            let marker = match report.status {
                StageStatus::Succeeded => "✓".green(),
                StageStatus::Failed => "✗".red(),
                StageStatus::Tolerated => "⚠".yellow(),
                StageStatus::Skipped | StageStatus::NotRun => "○".dimmed(),
            };
            let attempts = if report.attempts > 1 {
                format!(" ({} attempts)", report.attempts)
            } else {
                String::new()
            };
            println!("  {} {}{}", marker, report.stage.name(), attempts.dimmed());
        }
    }

    if !run.log.is_empty() {
        println!();
        println!("{}:", "Log".bold());
        for line in &run.log {
            println!("  {}", line.dimmed());
        }
    }
}

fn status_marker(status: &RunStatus) -> colored::ColoredString {
    match status {
        RunStatus::Success => "✓".green(),
        RunStatus::Failure { .. } => "✗".red(),
        RunStatus::Aborted => "○".yellow(),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
