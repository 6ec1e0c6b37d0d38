// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Stage definitions
//!
//! The pipeline is a fixed list of stages. Each stage is plain data: what it
//! does, whether it runs for a given parameter set, what a failure means,
//! and whether its body is retried.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::retry::RetryPolicy;
use crate::params::Parameters;

/// Total attempts for the push block
pub const PUSH_ATTEMPTS: u32 = 3;

/// What a stage does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Checkout,
    Preparation,
    ComputeMetadata,
    RegistryLogin,
    BuildImage,
    PushImage,
    VerifyRegistry,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Checkout => "Checkout",
            Self::Preparation => "Preparation",
            Self::ComputeMetadata => "Compute Metadata",
            Self::RegistryLogin => "Registry Login",
            Self::BuildImage => "Build Image",
            Self::PushImage => "Push Image",
            Self::VerifyRegistry => "Verify in Registry",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Condition for running a stage, evaluated before it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    /// Only when registry authentication is enabled
    RegistryAuth,
}

impl Guard {
    pub fn allows(&self, params: &Parameters) -> bool {
        match self {
            Self::Always => true,
            Self::RegistryAuth => params.registry_auth,
        }
    }
}

/// What a failure of the stage does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the remaining stages and fail the run
    Fatal,
    /// Log and carry on; the outcome is unaffected
    Tolerated,
}

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub guard: Guard,
    pub failure: FailurePolicy,
    pub retry: Option<RetryPolicy>,
}

impl Stage {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            guard: Guard::Always,
            failure: FailurePolicy::Fatal,
            retry: None,
        }
    }

    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn tolerated(mut self) -> Self {
        self.failure = FailurePolicy::Tolerated;
        self
    }

    pub fn retried(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Attempts this stage's body may take
    pub fn max_attempts(&self) -> u32 {
        self.retry.map_or(1, |r| r.max_attempts)
    }

    /// The stage list, in execution order
    pub fn standard() -> Vec<Stage> {
        vec![
            Stage::new(StageKind::Checkout),
            Stage::new(StageKind::Preparation),
            Stage::new(StageKind::ComputeMetadata),
            Stage::new(StageKind::RegistryLogin).guarded(Guard::RegistryAuth),
            Stage::new(StageKind::BuildImage),
            Stage::new(StageKind::PushImage).retried(RetryPolicy::new(PUSH_ATTEMPTS)),
            Stage::new(StageKind::VerifyRegistry).tolerated(),
        ]
    }
}
