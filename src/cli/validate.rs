// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Validate command - check parameters and required tools

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};

use super::ParamArgs;
use crate::params::{ParameterValidator, Parameters, CONFIG_FILE};
use crate::tools::check_available;
use crate::utils::create_spinner;

/// How much a missing program matters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    /// The pipeline cannot run without it
    Required,
    /// Only a tolerated step depends on it
    Optional,
}

/// Run the validate command
pub async fn run(args: ParamArgs, config: Option<PathBuf>, verbose: bool) -> Result<()> {
    println!("{}", "Validating parameters...".bold());
    println!();

    let source = config
        .clone()
        .or_else(|| Path::new(CONFIG_FILE).exists().then(|| PathBuf::from(CONFIG_FILE)));

    let params = match Parameters::load(config.as_deref(), args.into()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to load parameters", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    match source {
        Some(ref path) => println!("  {} {} is valid YAML", "✓".green(), path.display()),
        None => println!("  {} No config file, using defaults", "○".dimmed()),
    }

    let validation = ParameterValidator::validate(&params)?;

    let tools = [
        (params.tools.engine.as_str(), Need::Required),
        (params.tools.git.as_str(), Need::Optional),
        (params.tools.curl.as_str(), Need::Optional),
    ];

    let spinner = create_spinner("Checking tools...");
    let missing: Vec<_> = tools
        .iter()
        .filter_map(|(program, need)| {
            check_available(program).err().map(|e| (*program, *need, e))
        })
        .collect();
    spinner.finish_and_clear();

    for (program, _) in &tools {
        if !missing.iter().any(|(m, _, _)| m == program) {
            println!("  {} {} found", "✓".green(), program);
        }
    }

    let mut failed = !validation.is_valid();

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !missing.is_empty() {
        println!();
        println!("{}:", "Missing tools".yellow().bold());
        for (program, need, error) in &missing {
            match need {
                Need::Required => {
                    failed = true;
                    println!("  {} {}", "✗".red(), error);
                }
                Need::Optional => println!("  {} {}", "⚠".yellow(), error),
            }
        }
        if missing.iter().any(|(p, _, _)| *p == params.tools.git) {
            println!("    {}", "Without git the commit tag is 'nogit'.".dimmed());
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Resolved parameters".bold());
        for line in params.to_yaml()?.lines() {
            println!("  {}", line.dimmed());
        }
    }

    println!();

    if failed {
        Err(miette::miette!("Validation failed"))
    } else if validation.has_warnings() || !missing.is_empty() {
        println!("{}", "Parameters are valid but have warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Parameters are valid!".green().bold());
        Ok(())
    }
}
