// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Credential resolution
//!
//! A credential reference is an opaque id that resolves to a username and a
//! secret. The secret only ever leaves this module through
//! [`Secret::expose`], and the only caller of that is the process runner
//! when it writes the secret to a child's stdin.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{TagflowError, TagflowResult};

const REDACTED: &str = "****";

/// A secret value that never renders itself
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret. Only for feeding a child process over stdin.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// A resolved username/secret pair
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(alias = "password")]
    pub secret: Secret,
}

/// Resolves a credential reference to a username/secret pair
pub trait CredentialResolver: Send + Sync {
    /// Look up a reference. `Ok(None)` means this resolver doesn't know it.
    fn lookup(&self, reference: &str) -> TagflowResult<Option<Credentials>>;

    /// Look up a reference, failing if it is unknown
    fn resolve(&self, reference: &str) -> TagflowResult<Credentials> {
        self.lookup(reference)?
            .ok_or_else(|| TagflowError::credentials_not_found(reference))
    }
}

/// Environment variable prefix for a reference: `reg-creds` → `REG_CREDS`
pub fn env_prefix(reference: &str) -> String {
    reference
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Reads `<REF>_USR` / `<REF>_PSW` from an environment source
pub struct EnvCredentialResolver {
    vars: HashMap<String, String>,
}

impl EnvCredentialResolver {
    /// Snapshot the process environment
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Use an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl CredentialResolver for EnvCredentialResolver {
    fn lookup(&self, reference: &str) -> TagflowResult<Option<Credentials>> {
        let prefix = env_prefix(reference);
        let username = self.vars.get(&format!("{}_USR", prefix));
        let secret = self.vars.get(&format!("{}_PSW", prefix));

        match (username, secret) {
            (Some(username), Some(secret)) => Ok(Some(Credentials {
                username: username.clone(),
                secret: Secret::new(secret.clone()),
            })),
            _ => Ok(None),
        }
    }
}

/// YAML file mapping references to credentials:
///
/// ```yaml
/// registry-creds:
///   username: ci
///   password: s3cret
/// ```
pub struct FileCredentialResolver {
    entries: HashMap<String, Credentials>,
}

impl FileCredentialResolver {
    pub fn from_file(path: &Path) -> TagflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TagflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> TagflowResult<Self> {
        let entries: HashMap<String, Credentials> = serde_yaml::from_str(yaml)?;
        Ok(Self { entries })
    }
}

impl CredentialResolver for FileCredentialResolver {
    fn lookup(&self, reference: &str) -> TagflowResult<Option<Credentials>> {
        Ok(self.entries.get(reference).cloned())
    }
}

/// Tries resolvers in order; the first one that knows the reference wins
#[derive(Default)]
pub struct ChainResolver {
    resolvers: Vec<Box<dyn CredentialResolver>>,
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Box<dyn CredentialResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Credentials file (if configured) first, then the process environment
    pub fn standard(credentials_file: Option<&PathBuf>) -> TagflowResult<Self> {
        let mut chain = Self::new();
        if let Some(path) = credentials_file {
            chain = chain.with(Box::new(FileCredentialResolver::from_file(path)?));
        }
        Ok(chain.with(Box::new(EnvCredentialResolver::from_env())))
    }
}

impl CredentialResolver for ChainResolver {
    fn lookup(&self, reference: &str) -> TagflowResult<Option<Credentials>> {
        for resolver in &self.resolvers {
            if let Some(creds) = resolver.lookup(reference)? {
                return Ok(Some(creds));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_secret_never_renders() {
        let creds = Credentials {
            username: "ci".into(),
            secret: Secret::new("hunter2"),
        };

        assert_eq!(format!("{}", creds.secret), "****");
        assert!(!format!("{:?}", creds).contains("hunter2"));
        assert_eq!(creds.secret.expose(), "hunter2");
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("reg-creds"), "REG_CREDS");
        assert_eq!(env_prefix("docker.hub/ci"), "DOCKER_HUB_CI");
    }

    #[test]
    fn test_env_resolver() {
        let resolver = EnvCredentialResolver::from_vars(vars(&[
            ("REG_CREDS_USR", "ci"),
            ("REG_CREDS_PSW", "s3cret"),
        ]));

        let creds = resolver.resolve("reg-creds").unwrap();
        assert_eq!(creds.username, "ci");
        assert_eq!(creds.secret.expose(), "s3cret");
    }

    #[test]
    fn test_env_resolver_requires_both_halves() {
        let resolver = EnvCredentialResolver::from_vars(vars(&[("REG_CREDS_USR", "ci")]));
        assert!(resolver.lookup("reg-creds").unwrap().is_none());
        assert!(matches!(
            resolver.resolve("reg-creds"),
            Err(TagflowError::CredentialsNotFound { .. })
        ));
    }

    #[test]
    fn test_file_resolver_accepts_password_key() {
        let resolver = FileCredentialResolver::from_yaml(
            r#"
registry-creds:
  username: ci
  password: s3cret
"#,
        )
        .unwrap();

        let creds = resolver.resolve("registry-creds").unwrap();
        assert_eq!(creds.username, "ci");
        assert_eq!(creds.secret.expose(), "s3cret");
    }

    #[test]
    fn test_chain_prefers_first_resolver() {
        let file = FileCredentialResolver::from_yaml(
            "creds:\n  username: from-file\n  secret: a\n",
        )
        .unwrap();
        let env = EnvCredentialResolver::from_vars(vars(&[
            ("CREDS_USR", "from-env"),
            ("CREDS_PSW", "b"),
            ("OTHER_USR", "other"),
            ("OTHER_PSW", "c"),
        ]));

        let chain = ChainResolver::new().with(Box::new(file)).with(Box::new(env));

        assert_eq!(chain.resolve("creds").unwrap().username, "from-file");
        assert_eq!(chain.resolve("other").unwrap().username, "other");
        assert!(chain.resolve("missing").is_err());
    }
}
