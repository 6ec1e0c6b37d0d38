// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! # tagflow - container image build-and-publish pipeline
//!
//! `tagflow` checks out a source tree, builds one container image, tags it
//! three ways (`latest`, the build number, the short commit hash) and
//! pushes every tag to a registry.
//!
//! ## Features
//!
//! - **Fixed stage sequence** - checkout, preparation, metadata, login, build, push, verify
//! - **Deterministic tags** - `nogit` stands in when there is no commit to name
//! - **Retried pushes** - the push block is attempted up to three times
//! - **Secret hygiene** - registry secrets only ever travel over stdin
//! - **Run history** - the last 20 runs are kept with their command log
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a config with the defaults
//! tagflow init
//!
//! # See which references a run would push
//! tagflow tags
//!
//! # Build and publish
//! tagflow run
//! ```

pub mod cli;
pub mod errors;
pub mod history;
pub mod params;
pub mod pipeline;
pub mod secrets;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use errors::{TagflowError, TagflowResult};
pub use params::Parameters;
pub use pipeline::{ImageRefs, PipelineExecutor, PipelineResult, RunStatus, Stage, StageKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
