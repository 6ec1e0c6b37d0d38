// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Version control client

use std::path::Path;

use super::{CommandRunner, CommandSpec};

/// Remote name used when populating a fresh workspace
const REMOTE: &str = "origin";

/// Ref left behind by a fetch, pointing at the fetched revision
pub const FETCH_HEAD: &str = "FETCH_HEAD";

/// Builds git invocations
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
}

impl GitClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program).current_dir(dir)
    }

    pub fn short_hash_command(&self, dir: &Path) -> CommandSpec {
        self.command(dir)
            .args(["rev-parse", "--short", "HEAD"])
            .captured()
    }

    pub fn init_command(&self, dir: &Path) -> CommandSpec {
        self.command(dir).args(["init", "--quiet"])
    }

    pub fn add_remote_command(&self, repository: &str, dir: &Path) -> CommandSpec {
        self.command(dir).args(["remote", "add", REMOTE, repository])
    }

    /// Fetch `revision` (the remote's HEAD when `None`) into `FETCH_HEAD`
    pub fn fetch_revision_command(&self, revision: Option<&str>, dir: &Path) -> CommandSpec {
        self.command(dir)
            .args(["fetch", "--tags", REMOTE])
            .arg(revision.unwrap_or("HEAD"))
    }

    pub fn fetch_command(&self, dir: &Path) -> CommandSpec {
        self.command(dir).args(["fetch", "--all", "--tags"])
    }

    pub fn checkout_command(&self, revision: &str, dir: &Path) -> CommandSpec {
        self.command(dir).args(["checkout", "--force", revision])
    }

    /// Short hash of the current checkout, or `None` when there is no usable
    /// version control metadata (git missing, not a repository, empty output)
    pub async fn short_hash(&self, runner: &dyn CommandRunner, dir: &Path) -> Option<String> {
        let output = runner.run(&self.short_hash_command(dir)).await.ok()?;
        if !output.success() {
            return None;
        }
        output.first_line().map(str::to_string)
    }
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("git")
    }
}

/// Whether `dir` already holds a git checkout
pub fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}
