// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Pipeline definition and execution
//!
//! The fixed stage list, the run environment threaded through it, tag
//! computation, the retry combinator and the executor that ties them
//! together.

mod definition;
mod environment;
mod executor;
mod lock;
mod metadata;
mod retry;

pub use definition::{FailurePolicy, Guard, Stage, StageKind, PUSH_ATTEMPTS};
pub use environment::RunEnvironment;
pub use executor::{
    ExecutionOptions, PipelineExecutor, PipelineResult, PlannedStage, RunStatus, StageReport,
    StageStatus,
};
pub use lock::RunLock;
pub use metadata::{split_reference, BuildIdentity, CommitRef, ImageRefs, LATEST, NO_GIT};
pub use retry::RetryPolicy;
