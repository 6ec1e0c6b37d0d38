// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

use super::ParamArgs;
use crate::errors::TagflowError;
use crate::history::{FilesystemHistory, HistoryStore, RunRecord};
use crate::params::{ParameterValidator, Parameters, STATE_DIR};
use crate::pipeline::{ExecutionOptions, PipelineExecutor, RunLock};
use crate::secrets::ChainResolver;
use crate::tools::ProcessRunner;

/// Run the pipeline
pub async fn run(
    args: ParamArgs,
    config: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let params = Parameters::load(config.as_deref(), args.into())?;

    let validation = ParameterValidator::validate(&params)?;
    if !validation.is_valid() {
        eprintln!("{}", "Parameter validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
    }
    ParameterValidator::require_valid(&params)?;

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Parameter warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let runner = Arc::new(ProcessRunner::new());
    let credentials = ChainResolver::standard(params.credentials_file.as_ref())?;
    let executor = PipelineExecutor::new(runner, Box::new(credentials));

    if dry_run {
        let history = open_history(&params, &working_dir, false)?;
        let build_number = resolve_build_number(&params, history.as_ref()).await?;
        return print_dry_run(&executor, &params, build_number, &working_dir).await;
    }

    // Held until this function returns; a concurrent run fails here.
    let _lock = RunLock::acquire(&working_dir.join(STATE_DIR))?;

    let history = open_history(&params, &working_dir, true)?;
    let build_number = resolve_build_number(&params, history.as_ref()).await?;
    info!("Starting run #{}", build_number);

    let options = ExecutionOptions { verbose };
    let started_at = SystemTime::now();

    // Dropping the execution future kills the running child process.
    let outcome = tokio::select! {
        result = executor.execute(&params, build_number, &working_dir, &options) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(result) = outcome else {
        eprintln!();
        eprintln!("{}", format!("Run #{} aborted", build_number).yellow().bold());
        if let Some(ref history) = history {
            record(history, &RunRecord::aborted(build_number, started_at)).await;
        }
        return Err(TagflowError::Cancelled.into());
    };

    if let Some(ref history) = history {
        record(history, &RunRecord::from_result(&result, started_at)).await;
    }

    match result.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Open the history store. Without `create`, a missing directory means "no history".
fn open_history(
    params: &Parameters,
    working_dir: &Path,
    create: bool,
) -> Result<Option<FilesystemHistory>> {
    if !params.history.enabled {
        return Ok(None);
    }

    let dir = working_dir.join(&params.history.directory);
    if !create && !dir.exists() {
        return Ok(None);
    }

    Ok(Some(FilesystemHistory::new(dir, params.history.keep)?))
}

/// Build number from the parameters, else one past the last recorded run
pub(crate) async fn resolve_build_number(
    params: &Parameters,
    history: Option<&FilesystemHistory>,
) -> Result<u64> {
    if let Some(n) = params.build_number {
        return Ok(n);
    }

    match history {
        Some(history) => Ok(history.next_build_number().await?),
        None => Ok(1),
    }
}

/// Recording a run never changes its outcome
async fn record(history: &FilesystemHistory, record: &RunRecord) {
    match history.store(record).await {
        Ok(()) => info!("Recorded run #{} in {}", record.build_number, history.dir().display()),
        Err(e) => warn!("Failed to record run #{}: {}", record.build_number, e),
    }
}

async fn print_dry_run(
    executor: &PipelineExecutor,
    params: &Parameters,
    build_number: u64,
    working_dir: &Path,
) -> Result<()> {
    println!("{}", "Dry run - nothing will be executed".yellow().bold());
    println!();

    let (identity, refs) = executor.preview(params, build_number, working_dir).await;
    println!("  {} {}", "Build:".dimmed(), identity.display_label());
    for reference in refs.all() {
        println!("  {} {}", "Image:".dimmed(), reference);
    }
    println!();

    for (i, step) in executor.plan(params).iter().enumerate() {
        let mut notes = Vec::new();
        if step.max_attempts > 1 {
            notes.push(format!("up to {} attempts", step.max_attempts));
        }
        if step.tolerated {
            notes.push("best effort".to_string());
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!(" [{}]", notes.join(", "))
        };

        if step.runs {
            println!("  {}. {}{}", i + 1, step.stage.name().bold(), notes.dimmed());
        } else {
            println!(
                "  {}. {} {}",
                i + 1,
                step.stage.name().dimmed(),
                "(skipped)".dimmed()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_explicit_build_number_wins() {
        let temp_dir = TempDir::new().unwrap();
        let history = FilesystemHistory::new(temp_dir.path().to_path_buf(), 20).unwrap();
        history
            .store(&RunRecord::aborted(7, SystemTime::now()))
            .await
            .unwrap();

        let params = Parameters {
            build_number: Some(3),
            ..Default::default()
        };
        assert_eq!(resolve_build_number(&params, Some(&history)).await.unwrap(), 3);

        let params = Parameters::default();
        assert_eq!(resolve_build_number(&params, Some(&history)).await.unwrap(), 8);
        assert_eq!(resolve_build_number(&params, None).await.unwrap(), 1);
    }

    #[test]
    fn test_history_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let mut params = Parameters::default();
        params.history.enabled = false;

        assert!(open_history(&params, temp_dir.path(), true).unwrap().is_none());
        assert!(!temp_dir.path().join(STATE_DIR).exists());
    }
}
