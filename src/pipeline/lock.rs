// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! One run at a time
//!
//! A run holds `run.lock` in the state directory for its whole duration.
//! A second run started while the file exists is rejected, not queued.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::{TagflowError, TagflowResult};

const LOCK_FILE: &str = "run.lock";

/// Exclusive run lock, released on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(state_dir: &Path) -> TagflowResult<Self> {
        std::fs::create_dir_all(state_dir).map_err(|e| TagflowError::FileWriteError {
            path: state_dir.to_path_buf(),
            error: e.to_string(),
        })?;

        let path = state_dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(TagflowError::RunInProgress {
                    lock: path.display().to_string(),
                })
            }
            Err(e) => {
                return Err(TagflowError::FileWriteError {
                    path,
                    error: e.to_string(),
                })
            }
        };

        writeln!(file, "{}", std::process::id())?;
        info!("Acquired run lock {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to release run lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_run_rejected_while_held() {
        let dir = TempDir::new().unwrap();

        let lock = RunLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        assert!(matches!(
            RunLock::acquire(dir.path()),
            Err(TagflowError::RunInProgress { .. })
        ));

        drop(lock);
        assert!(RunLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_creates_state_dir() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("nested").join(".tagflow");

        let lock = RunLock::acquire(&state).unwrap();
        assert!(lock.path().starts_with(&state));
    }
}
