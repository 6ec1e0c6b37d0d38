// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Run parameters
//!
//! The parameter set is resolved once when a run starts and never changes
//! afterwards. Sources, lowest precedence first: built-in defaults, the
//! `.tagflow.yaml` config file, environment variables, command-line flags.

mod validation;

pub use validation::{ParameterValidator, ValidationResult};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{TagflowError, TagflowResult};

/// Default config file name
pub const CONFIG_FILE: &str = ".tagflow.yaml";

/// Directory for lock and history state
pub const STATE_DIR: &str = ".tagflow";

pub const DEFAULT_REGISTRY_HOST: &str = "host.minikube.internal:5000";
pub const DEFAULT_IMAGE_NAME: &str = "flask-jenkins-demo";

/// Parameter set for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    /// Registry `host[:port]`
    pub registry_host: String,

    /// Repository path of the image inside the registry
    pub image_name: String,

    /// Dockerfile path, relative to the working directory
    pub dockerfile: String,

    /// Build context path
    pub build_context: String,

    /// Log in to the registry before pushing
    pub registry_auth: bool,

    /// Credential reference resolved to a username/secret pair
    pub registry_credentials_id: String,

    /// Build number from the host; history supplies one when absent
    pub build_number: Option<u64>,

    /// YAML file mapping credential references to credentials
    pub credentials_file: Option<PathBuf>,

    pub checkout: CheckoutConfig,

    pub tools: ToolsConfig,

    pub history: HistoryConfig,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            registry_host: DEFAULT_REGISTRY_HOST.to_string(),
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            dockerfile: "Dockerfile".to_string(),
            build_context: ".".to_string(),
            registry_auth: false,
            registry_credentials_id: String::new(),
            build_number: None,
            credentials_file: None,
            checkout: CheckoutConfig::default(),
            tools: ToolsConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

/// What the checkout stage fetches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Repository to fetch when the working directory isn't a checkout yet
    pub repository: Option<String>,

    /// Revision to check out
    pub revision: Option<String>,
}

impl CheckoutConfig {
    /// Nothing to fetch; the workspace is used as-is
    pub fn is_noop(&self) -> bool {
        self.repository.is_none() && self.revision.is_none()
    }
}

/// External programs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub engine: String,
    pub git: String,
    pub curl: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            engine: "docker".to_string(),
            git: "git".to_string(),
            curl: "curl".to_string(),
        }
    }
}

/// Run history retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Number of runs kept
    pub keep: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(STATE_DIR).join("history"),
            keep: 20,
        }
    }
}

/// Values supplied by flags or environment variables. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub registry_host: Option<String>,
    pub image_name: Option<String>,
    pub dockerfile: Option<String>,
    pub build_context: Option<String>,
    pub registry_auth: Option<bool>,
    pub registry_credentials_id: Option<String>,
    pub build_number: Option<u64>,
    pub credentials_file: Option<PathBuf>,
    pub repository: Option<String>,
    pub revision: Option<String>,
    pub engine: Option<String>,
}

impl Parameters {
    /// Load parameters from a YAML file
    pub fn from_file(path: &Path) -> TagflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TagflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_yaml(&content)
    }

    /// Parse parameters from a YAML string; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> TagflowResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Resolve the parameter set for a run.
    ///
    /// An explicitly named config file must exist; the default one is
    /// optional.
    pub fn load(config: Option<&Path>, overrides: ParamOverrides) -> TagflowResult<Self> {
        let base = match config {
            Some(path) if !path.exists() => {
                return Err(TagflowError::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };

        Ok(base.with_overrides(overrides))
    }

    /// Apply flag/env values on top of these parameters
    pub fn with_overrides(mut self, o: ParamOverrides) -> Self {
        if let Some(v) = o.registry_host {
            self.registry_host = v;
        }
        if let Some(v) = o.image_name {
            self.image_name = v;
        }
        if let Some(v) = o.dockerfile {
            self.dockerfile = v;
        }
        if let Some(v) = o.build_context {
            self.build_context = v;
        }
        if let Some(v) = o.registry_auth {
            self.registry_auth = v;
        }
        if let Some(v) = o.registry_credentials_id {
            self.registry_credentials_id = v;
        }
        if o.build_number.is_some() {
            self.build_number = o.build_number;
        }
        if o.credentials_file.is_some() {
            self.credentials_file = o.credentials_file;
        }
        if o.repository.is_some() {
            self.checkout.repository = o.repository;
        }
        if o.revision.is_some() {
            self.checkout.revision = o.revision;
        }
        if let Some(v) = o.engine {
            self.tools.engine = v;
        }
        self
    }

    /// Seed values for the run environment
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("REGISTRY_HOST".to_string(), self.registry_host.clone());
        env.insert("IMAGE_NAME".to_string(), self.image_name.clone());
        env.insert("DOCKERFILE".to_string(), self.dockerfile.clone());
        env.insert("BUILD_CONTEXT".to_string(), self.build_context.clone());
        env.insert("REGISTRY_AUTH".to_string(), self.registry_auth.to_string());
        env
    }

    /// `host/image` without a tag
    pub fn repository(&self) -> String {
        format!("{}/{}", self.registry_host, self.image_name)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> TagflowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let params = Parameters::default();
        assert_eq!(params.registry_host, "host.minikube.internal:5000");
        assert_eq!(params.image_name, "flask-jenkins-demo");
        assert_eq!(params.dockerfile, "Dockerfile");
        assert_eq!(params.build_context, ".");
        assert!(!params.registry_auth);
        assert!(params.registry_credentials_id.is_empty());
        assert_eq!(params.history.keep, 20);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let params = Parameters::from_yaml(
            r#"
registry_host: "reg:5000"
image_name: svc
tools:
  engine: podman
"#,
        )
        .unwrap();

        assert_eq!(params.registry_host, "reg:5000");
        assert_eq!(params.image_name, "svc");
        assert_eq!(params.tools.engine, "podman");
        assert_eq!(params.tools.git, "git");
        assert_eq!(params.dockerfile, "Dockerfile");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Parameters::from_yaml("").unwrap(), Parameters::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Parameters::from_yaml("registry: reg:5000\n").is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tagflow.yaml");
        std::fs::write(&path, "image_name: from-file\nregistry_auth: true\n").unwrap();

        let params = Parameters::load(
            Some(&path),
            ParamOverrides {
                image_name: Some("from-flag".into()),
                build_number: Some(7),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(params.image_name, "from-flag");
        assert!(params.registry_auth);
        assert_eq!(params.build_number, Some(7));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");

        assert!(matches!(
            Parameters::load(Some(&path), ParamOverrides::default()),
            Err(TagflowError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_env_seed() {
        let env = Parameters::default().to_env();
        assert_eq!(env["REGISTRY_AUTH"], "false");
        assert_eq!(env["IMAGE_NAME"], "flask-jenkins-demo");
    }

    #[test]
    fn test_yaml_round_trip() {
        let params = Parameters::default();
        let parsed = Parameters::from_yaml(&params.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed, params);
    }
}
