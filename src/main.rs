// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! tagflow - container image build-and-publish pipeline

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagflow::cli::{Cli, Commands};
use tagflow::TagflowError;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    if let Err(report) = dispatch(cli).await {
        // A failing stage's exit status becomes ours
        let code = report
            .downcast_ref::<TagflowError>()
            .map_or(1, TagflowError::exit_code);
        eprintln!("{:?}", report);
        std::process::exit(code);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Run {
            params,
            config,
            dry_run,
        } => tagflow::cli::run::run(params, config, dry_run, cli.verbose).await,
        Commands::Tags { params, config } => {
            tagflow::cli::tags::run(params, config, cli.verbose).await
        }
        Commands::Validate { params, config } => {
            tagflow::cli::validate::run(params, config, cli.verbose).await
        }
        Commands::Init { force } => tagflow::cli::init::run(force, cli.verbose).await,
        Commands::History { config, action } => {
            tagflow::cli::history::run(action, config, cli.verbose).await
        }
    }
}
