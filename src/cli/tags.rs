// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Tags command - show the references a run would push

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::ParamArgs;
use crate::history::FilesystemHistory;
use crate::params::{ParameterValidator, Parameters};
use crate::pipeline::PipelineExecutor;
use crate::secrets::ChainResolver;
use crate::tools::ProcessRunner;

/// Run the tags command
pub async fn run(args: ParamArgs, config: Option<PathBuf>, verbose: bool) -> Result<()> {
    let params = Parameters::load(config.as_deref(), args.into())?;
    ParameterValidator::require_valid(&params)?;

    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    // Read-only: don't create the history directory just to number a preview
    let history_dir = working_dir.join(&params.history.directory);
    let history = if params.history.enabled && history_dir.exists() {
        Some(FilesystemHistory::new(history_dir, params.history.keep)?)
    } else {
        None
    };
    let build_number = super::run::resolve_build_number(&params, history.as_ref()).await?;

    let executor =
        PipelineExecutor::new(Arc::new(ProcessRunner::new()), Box::new(ChainResolver::new()));
    let (identity, refs) = executor.preview(&params, build_number, &working_dir).await;

    println!("{} {}", "Build: ".bold(), identity.display_label());
    println!("{} {}", "latest:".dimmed(), refs.latest);
    println!("{} {}", "build: ".dimmed(), refs.build);
    println!("{} {}", "commit:".dimmed(), refs.commit);

    if verbose && !identity.commit.is_available() {
        println!();
        println!(
            "{}",
            "No git metadata found; the commit tag falls back to 'nogit'.".dimmed()
        );
    }

    Ok(())
}
