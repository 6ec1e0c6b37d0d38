// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Parameter validation
//!
//! Validates the parameter set before any stage runs.

use regex::Regex;

use super::Parameters;
use crate::errors::{TagflowError, TagflowResult};

/// `host[:port]`, where host is a DNS name or IPv4 address
const REGISTRY_HOST_PATTERN: &str = r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*(:[0-9]{1,5})?$";

/// Repository path components as OCI registries accept them
const IMAGE_NAME_PATTERN: &str = r"^[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*(/[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*)*$";

/// Parameter validator
pub struct ParameterValidator;

impl ParameterValidator {
    /// Validate a parameter set
    pub fn validate(params: &Parameters) -> TagflowResult<ValidationResult> {
        let mut result = ValidationResult::new();

        let host_re = compile(REGISTRY_HOST_PATTERN)?;
        let image_re = compile(IMAGE_NAME_PATTERN)?;

        if !host_re.is_match(&params.registry_host) {
            result.add_error(&format!(
                "Registry host '{}' is not of the form host[:port]",
                params.registry_host
            ));
        }

        if !image_re.is_match(&params.image_name) {
            result.add_error(&format!(
                "Image name '{}' is not a valid repository path (lowercase letters, digits, separators)",
                params.image_name
            ));
        }

        if params.dockerfile.trim().is_empty() {
            result.add_error("Dockerfile path is empty");
        }

        if params.build_context.trim().is_empty() {
            result.add_error("Build context path is empty");
        }

        let has_reference = !params.registry_credentials_id.trim().is_empty();
        if params.registry_auth && !has_reference {
            result.add_error("Registry authentication is enabled but no credentials id is set");
        }
        if !params.registry_auth && has_reference {
            result.add_warning(&format!(
                "Credentials id '{}' is ignored because registry authentication is disabled",
                params.registry_credentials_id
            ));
        }

        if params.history.enabled && params.history.keep == 0 {
            result.add_error("History retention must keep at least one run");
        }

        if params.checkout.repository.as_deref().is_some_and(|r| r.trim().is_empty()) {
            result.add_error("Checkout repository is empty");
        }

        Ok(result)
    }

    /// Validate and turn the first error into a hard failure
    pub fn require_valid(params: &Parameters) -> TagflowResult<ValidationResult> {
        let result = Self::validate(params)?;
        if let Some(first) = result.errors.first() {
            return Err(TagflowError::InvalidParameters {
                reason: first.clone(),
                help: Some("Run 'tagflow validate' to see every problem".into()),
            });
        }
        Ok(result)
    }
}

fn compile(pattern: &str) -> TagflowResult<Regex> {
    Regex::new(pattern).map_err(|e| TagflowError::InvalidParameters {
        reason: format!("Invalid validation pattern: {}", e),
        help: None,
    })
}

/// Result of parameter validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
