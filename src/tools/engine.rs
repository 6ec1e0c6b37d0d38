// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Container engine client
//!
//! Works with any engine that speaks the docker CLI (docker, podman).

use std::path::Path;

use super::CommandSpec;
use crate::pipeline::ImageRefs;
use crate::secrets::Credentials;

/// Builds container engine invocations
#[derive(Debug, Clone)]
pub struct ContainerEngine {
    program: String,
}

impl ContainerEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program).current_dir(dir)
    }

    /// Reachability check: fails when the daemon isn't up
    pub fn version_command(&self, dir: &Path) -> CommandSpec {
        self.command(dir).arg("version")
    }

    /// One build applying every tag to the resulting image
    pub fn build_command(
        &self,
        dockerfile: &str,
        context: &str,
        refs: &ImageRefs,
        dir: &Path,
    ) -> CommandSpec {
        let mut spec = self.command(dir).args(["build", "-f", dockerfile]);
        for reference in refs.all() {
            spec = spec.args(["-t", reference]);
        }
        spec.arg(context)
    }

    /// Login with the secret on stdin, never in argv
    pub fn login_command(&self, host: &str, credentials: &Credentials, dir: &Path) -> CommandSpec {
        self.command(dir)
            .args(["login", host, "--username", credentials.username.as_str(), "--password-stdin"])
            .stdin_secret(credentials.secret.clone())
    }

    pub fn push_command(&self, reference: &str, dir: &Path) -> CommandSpec {
        self.command(dir).args(["push", reference])
    }

    /// Local images, optionally filtered by repository
    pub fn images_command(&self, repository: Option<&str>, dir: &Path) -> CommandSpec {
        let spec = self.command(dir).args(["image", "ls"]);
        match repository {
            Some(repo) => spec.arg("--filter").arg(format!("reference={}", repo)),
            None => spec,
        }
    }
}

impl Default for ContainerEngine {
    fn default() -> Self {
        Self::new("docker")
    }
}
