// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Error types
//!
//! Every error carries a diagnostic code and, where there is something
//! actionable to say, a help line that points at the fix.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for tagflow operations
pub type TagflowResult<T> = Result<T, TagflowError>;

/// Main error type for tagflow
#[derive(Error, Debug, Diagnostic)]
pub enum TagflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(tagflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Failed to run '{tool}': {error}")]
    #[diagnostic(code(tagflow::tool_execution_failed))]
    ToolExecutionFailed {
        tool: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Stage '{stage}' failed with exit code {exit_code}")]
    #[diagnostic(code(tagflow::stage_failed))]
    StageFailed {
        stage: String,
        exit_code: i32,
        #[help]
        help: Option<String>,
    },

    #[error("Image reference '{key}' has already been computed for this run")]
    #[diagnostic(code(tagflow::image_ref_already_set))]
    ImageRefAlreadySet { key: String },

    #[error("Image references have not been computed yet")]
    #[diagnostic(
        code(tagflow::image_refs_missing),
        help("The metadata stage must run before build, push and verify")
    )]
    ImageRefsMissing,

    #[error("Another run is already in progress")]
    #[diagnostic(
        code(tagflow::run_in_progress),
        help("Wait for it to finish, or remove {lock} if no run is active")
    )]
    RunInProgress { lock: String },

    #[error("Run cancelled")]
    #[diagnostic(code(tagflow::cancelled))]
    Cancelled,

    // ─────────────────────────────────────────────────────────────────────────
    // Parameter / Credential Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid parameters: {reason}")]
    #[diagnostic(code(tagflow::invalid_parameters))]
    InvalidParameters {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Credentials '{reference}' could not be resolved")]
    #[diagnostic(
        code(tagflow::credentials_not_found),
        help("Export {reference_env}_USR and {reference_env}_PSW, or add the reference to the credentials file")
    )]
    CredentialsNotFound {
        reference: String,
        reference_env: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Config file not found: {path}")]
    #[diagnostic(
        code(tagflow::config_not_found),
        help("Create one with 'tagflow init'")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(tagflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(tagflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // History Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("History error: {message}")]
    #[diagnostic(code(tagflow::history_error))]
    HistoryError { message: String },

    #[error("No recorded run with build number {build_number}")]
    #[diagnostic(code(tagflow::run_not_found))]
    RunNotFound { build_number: u64 },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(tagflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(tagflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(tagflow::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for TagflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for TagflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for TagflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl TagflowError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "docker" => "Install Docker: https://docs.docker.com/engine/install/".to_string(),
            "podman" => "Install Podman: https://podman.io/docs/installation".to_string(),
            "git" => "Install Git: https://git-scm.com/downloads".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Create a credentials error for a reference, naming the env vars it was looked up under
    pub fn credentials_not_found(reference: &str) -> Self {
        Self::CredentialsNotFound {
            reference: reference.to_string(),
            reference_env: crate::secrets::env_prefix(reference),
        }
    }

    /// Create a stage failure with a hint for the common causes
    pub fn stage_failed(stage: &str, exit_code: i32) -> Self {
        let help = match stage {
            "Registry Login" => Some("Check the credentials and that the registry is reachable".into()),
            "Push Image" => Some("The registry rejected the push after all retries; check that it is running and accepts pushes over this protocol".into()),
            "Build Image" => Some("See the build output above for the failing instruction".into()),
            _ => None,
        };

        Self::StageFailed {
            stage: stage.to_string(),
            exit_code,
            help,
        }
    }

    /// Process exit status to surface for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StageFailed { exit_code, .. } if (1..=255).contains(exit_code) => *exit_code,
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}
