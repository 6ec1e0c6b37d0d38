// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Filesystem-based history
//!
//! Stores each run as `<build-number>.json` in the history directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{HistoryStore, RunRecord};
use crate::errors::TagflowError;

/// Filesystem-based history store
pub struct FilesystemHistory {
    /// History directory
    dir: PathBuf,
    /// Number of runs kept
    keep: usize,
}

impl FilesystemHistory {
    /// Create a history store, creating the directory if needed
    pub fn new(dir: PathBuf, keep: usize) -> Result<Self, TagflowError> {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| TagflowError::HistoryError {
                message: format!("Failed to create history directory: {}", e),
            })?;
        }

        Ok(Self::open(dir, keep))
    }

    /// Open a history store without touching the filesystem.
    /// A missing directory reads as an empty history.
    pub fn open(dir: PathBuf, keep: usize) -> Self {
        Self {
            dir,
            keep: keep.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, build_number: u64) -> PathBuf {
        self.dir.join(format!("{}.json", build_number))
    }

    /// Build numbers with a record on disk, unordered
    fn build_numbers(&self) -> Result<Vec<u64>, TagflowError> {
        let mut numbers = Vec::new();

        if !self.dir.exists() {
            return Ok(numbers);
        }

        for entry in std::fs::read_dir(&self.dir).map_err(|e| TagflowError::HistoryError {
            message: format!("Failed to read history directory: {}", e),
        })? {
            let path = entry
                .map_err(|e| TagflowError::HistoryError {
                    message: format!("Failed to read history entry: {}", e),
                })?
                .path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            if let Some(n) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                numbers.push(n);
            }
        }

        Ok(numbers)
    }

    async fn read_record(&self, path: &Path) -> Result<RunRecord, TagflowError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            TagflowError::HistoryError {
                message: format!("Failed to read {}: {}", path.display(), e),
            }
        })?;

        serde_json::from_str(&content).map_err(|e| TagflowError::HistoryError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })
    }
}

#[async_trait]
impl HistoryStore for FilesystemHistory {
    async fn store(&self, record: &RunRecord) -> Result<(), TagflowError> {
        let json = serde_json::to_string_pretty(record).map_err(|e| TagflowError::HistoryError {
            message: format!("Failed to serialize run record: {}", e),
        })?;

        tokio::fs::write(self.record_path(record.build_number), json)
            .await
            .map_err(|e| TagflowError::HistoryError {
                message: format!("Failed to write run record: {}", e),
            })?;

        self.prune(self.keep).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RunRecord>, TagflowError> {
        let mut numbers = self.build_numbers()?;
        numbers.sort_unstable_by(|a, b| b.cmp(a));

        let mut records = Vec::with_capacity(numbers.len());
        for n in numbers {
            match self.read_record(&self.record_path(n)).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable history entry: {}", e),
            }
        }

        Ok(records)
    }

    async fn get(&self, build_number: u64) -> Result<Option<RunRecord>, TagflowError> {
        let path = self.record_path(build_number);
        if !path.exists() {
            return Ok(None);
        }

        self.read_record(&path).await.map(Some)
    }

    async fn next_build_number(&self) -> Result<u64, TagflowError> {
        Ok(self.build_numbers()?.into_iter().max().map_or(1, |n| n + 1))
    }

    async fn clear(&self) -> Result<usize, TagflowError> {
        let numbers = self.build_numbers()?;

        for n in &numbers {
            tokio::fs::remove_file(self.record_path(*n))
                .await
                .map_err(|e| TagflowError::HistoryError {
                    message: format!("Failed to remove run #{}: {}", n, e),
                })?;
        }

        Ok(numbers.len())
    }

    async fn prune(&self, keep: usize) -> Result<usize, TagflowError> {
        let keep = keep.max(1);
        let mut numbers = self.build_numbers()?;
        if numbers.len() <= keep {
            return Ok(0);
        }

        numbers.sort_unstable_by(|a, b| b.cmp(a));
        let stale = &numbers[keep..];

        for n in stale {
            tokio::fs::remove_file(self.record_path(*n))
                .await
                .map_err(|e| TagflowError::HistoryError {
                    message: format!("Failed to discard run #{}: {}", n, e),
                })?;
        }

        debug!("Discarded {} old run(s)", stale.len());
        Ok(stale.len())
    }
}
