// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Registry discovery probe (`GET /v2/`) through curl

use std::path::Path;

use super::CommandSpec;

#[derive(Debug, Clone)]
pub struct RegistryProbe {
    program: String,
}

impl RegistryProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `curl -fsS http://<host>/v2/`; non-zero on any HTTP error
    pub fn discovery_command(&self, host: &str, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .current_dir(dir)
            .arg("-fsS")
            .arg(discovery_url(host))
    }
}

impl Default for RegistryProbe {
    fn default() -> Self {
        Self::new("curl")
    }
}

/// Discovery endpoint for a registry host
pub fn discovery_url(host: &str) -> String {
    format!("http://{}/v2/", host)
}
