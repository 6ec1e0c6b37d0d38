// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for tagflow.

pub mod history;
pub mod init;
pub mod run;
pub mod tags;
pub mod validate;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::params::ParamOverrides;

/// Container image build-and-publish pipeline
#[derive(Parser, Debug)]
#[clap(
    name = "tagflow",
    version,
    about = "Build a container image, tag it three ways and publish it to a registry",
    long_about = None,
    after_help = "Examples:\n\
        tagflow init                              Write a .tagflow.yaml with defaults\n\
        tagflow tags --build-number 42            Show the references a run would push\n\
        tagflow run                               Execute the pipeline\n\
        tagflow run --registry-auth --credentials-id reg-creds\n\
        tagflow history list                      Show recent runs\n\n\
        See 'tagflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run {
        #[clap(flatten)]
        params: ParamArgs,

        /// Config file (default: .tagflow.yaml when present)
        #[clap(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Show what would be done without running anything
        #[clap(long)]
        dry_run: bool,
    },

    /// Print the image references and build label for the current checkout
    Tags {
        #[clap(flatten)]
        params: ParamArgs,

        /// Config file (default: .tagflow.yaml when present)
        #[clap(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Validate parameters and check that required tools are installed
    Validate {
        #[clap(flatten)]
        params: ParamArgs,

        /// Config file (default: .tagflow.yaml when present)
        #[clap(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Write a .tagflow.yaml with the default parameters
    Init {
        /// Overwrite an existing .tagflow.yaml
        #[clap(short, long)]
        force: bool,
    },

    /// Run history
    History {
        /// Config file (default: .tagflow.yaml when present)
        #[clap(short, long, global = true, value_name = "FILE")]
        config: Option<PathBuf>,

        #[clap(subcommand)]
        action: HistoryAction,
    },
}

/// Run history actions
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryAction {
    /// List retained runs, newest first
    List,

    /// Show one run with its stage outcomes and command log
    Show {
        /// Build number
        build: u64,
    },

    /// Delete all retained runs
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

/// Run parameters settable by flag or environment variable.
/// Flags win over the environment, which wins over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// Registry host[:port]
    #[clap(long, env = "REGISTRY_HOST", value_name = "HOST")]
    pub registry_host: Option<String>,

    /// Image repository path inside the registry
    #[clap(long, env = "IMAGE_NAME", value_name = "NAME")]
    pub image_name: Option<String>,

    /// Dockerfile path
    #[clap(long, env = "DOCKERFILE", value_name = "PATH")]
    pub dockerfile: Option<String>,

    /// Build context directory
    #[clap(long, env = "BUILD_CONTEXT", value_name = "PATH")]
    pub build_context: Option<String>,

    /// Log in to the registry before pushing
    #[clap(
        long,
        env = "REGISTRY_AUTH",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub registry_auth: Option<bool>,

    /// Credential reference used for registry login
    #[clap(
        long = "credentials-id",
        visible_alias = "registry-credentials-id",
        env = "REGISTRY_CREDENTIALS_ID",
        value_name = "ID"
    )]
    pub registry_credentials_id: Option<String>,

    /// Build number (default: one past the last recorded run)
    #[clap(long, env = "BUILD_NUMBER", value_name = "N")]
    pub build_number: Option<u64>,

    /// YAML file mapping credential references to credentials
    #[clap(long, env = "TAGFLOW_CREDENTIALS_FILE", value_name = "FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Repository to fetch when the directory is not a checkout yet
    #[clap(long, env = "SOURCE_REPOSITORY", value_name = "URL")]
    pub repository: Option<String>,

    /// Revision to check out before building
    #[clap(long, env = "SOURCE_REVISION", value_name = "REV")]
    pub revision: Option<String>,

    /// Container engine program (docker, podman, ...)
    #[clap(long, env = "CONTAINER_ENGINE", value_name = "PROGRAM")]
    pub engine: Option<String>,
}

impl From<ParamArgs> for ParamOverrides {
    fn from(args: ParamArgs) -> Self {
        Self {
            registry_host: args.registry_host,
            image_name: args.image_name,
            dockerfile: args.dockerfile,
            build_context: args.build_context,
            registry_auth: args.registry_auth,
            registry_credentials_id: args.registry_credentials_id,
            build_number: args.build_number,
            credentials_file: args.credentials_file,
            repository: args.repository,
            revision: args.revision,
            engine: args.engine,
        }
    }
}
