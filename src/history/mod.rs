// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Run history
//!
//! Keeps metadata and the command log of recent runs. Only the newest runs
//! are retained; older ones are discarded after every store.

mod filesystem;

pub use filesystem::FilesystemHistory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::errors::TagflowError;
use crate::pipeline::{ImageRefs, PipelineResult, RunStatus, StageReport};

/// Trait for history stores
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a run, then discard runs beyond the retention limit
    async fn store(&self, record: &RunRecord) -> Result<(), TagflowError>;

    /// All retained runs, newest first
    async fn list(&self) -> Result<Vec<RunRecord>, TagflowError>;

    /// A single run by build number
    async fn get(&self, build_number: u64) -> Result<Option<RunRecord>, TagflowError>;

    /// Build number for the next run: one past the highest recorded
    async fn next_build_number(&self) -> Result<u64, TagflowError>;

    /// Remove every record
    async fn clear(&self) -> Result<usize, TagflowError>;

    /// Delete all but the newest `keep` records
    async fn prune(&self, keep: usize) -> Result<usize, TagflowError>;
}

/// Metadata and log of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub build_number: u64,
    pub display_label: String,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub image_refs: Option<ImageRefs>,
    pub status: RunStatus,
    pub started_at: SystemTime,
    pub duration_ms: u64,
    #[serde(default)]
    pub stages: Vec<StageReport>,
    #[serde(default)]
    pub log: Vec<String>,
}

impl RunRecord {
    /// Record for a finished run
    pub fn from_result(result: &PipelineResult, started_at: SystemTime) -> Self {
        Self {
            build_number: result.build_number,
            display_label: result.display_label.clone(),
            commit: result.commit.clone(),
            image_refs: result.image_refs.clone(),
            status: result.status.clone(),
            started_at,
            duration_ms: result.duration.as_millis() as u64,
            stages: result.stages.clone(),
            log: result.log.clone(),
        }
    }

    /// Record for a run cancelled before it produced a result
    pub fn aborted(build_number: u64, started_at: SystemTime) -> Self {
        let duration_ms = started_at
            .elapsed()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            build_number,
            display_label: format!("#{}", build_number),
            commit: None,
            image_refs: None,
            status: RunStatus::Aborted,
            started_at,
            duration_ms,
            stages: Vec::new(),
            log: Vec::new(),
        }
    }

    /// One-word status for listings
    pub fn status_label(&self) -> &'static str {
        match self.status {
            RunStatus::Success => "success",
            RunStatus::Failure { .. } => "failure",
            RunStatus::Aborted => "aborted",
        }
    }
}
