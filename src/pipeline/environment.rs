// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Run environment
//!
//! Name/value map threaded through the stages of one run and exported to
//! every external command. The image reference keys are write-once.

use std::collections::HashMap;

use super::metadata::{BuildIdentity, ImageRefs};
use crate::errors::{TagflowError, TagflowResult};
use crate::params::Parameters;

pub const BUILD_NUMBER: &str = "BUILD_NUMBER";
pub const GIT_COMMIT_SHORT: &str = "GIT_COMMIT_SHORT";
pub const IMAGE_LATEST: &str = "IMAGE_LATEST";
pub const IMAGE_BUILD: &str = "IMAGE_BUILD";
pub const IMAGE_COMMIT: &str = "IMAGE_COMMIT";

const WRITE_ONCE: [&str; 4] = [GIT_COMMIT_SHORT, IMAGE_LATEST, IMAGE_BUILD, IMAGE_COMMIT];

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct RunEnvironment {
    vars: HashMap<String, String>,
    build_number: u64,
    identity: Option<BuildIdentity>,
    image_refs: Option<ImageRefs>,
}

impl RunEnvironment {
    /// Seed from the parameter set and the run's build number
    pub fn new(params: &Parameters, build_number: u64) -> Self {
        let mut vars = params.to_env();
        vars.insert(BUILD_NUMBER.to_string(), build_number.to_string());

        Self {
            vars,
            build_number,
            identity: None,
            image_refs: None,
        }
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set an ordinary variable. Metadata keys can only be written through
    /// [`RunEnvironment::record_metadata`].
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> TagflowResult<()> {
        if WRITE_ONCE.contains(&key) {
            return Err(TagflowError::ImageRefAlreadySet {
                key: key.to_string(),
            });
        }
        self.vars.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Record the commit and the three image references, exactly once per run
    pub fn record_metadata(&mut self, identity: BuildIdentity, refs: ImageRefs) -> TagflowResult<()> {
        if self.image_refs.is_some() {
            return Err(TagflowError::ImageRefAlreadySet {
                key: IMAGE_LATEST.to_string(),
            });
        }

        self.vars
            .insert(GIT_COMMIT_SHORT.to_string(), identity.commit.tag().to_string());
        self.vars.insert(IMAGE_LATEST.to_string(), refs.latest.clone());
        self.vars.insert(IMAGE_BUILD.to_string(), refs.build.clone());
        self.vars.insert(IMAGE_COMMIT.to_string(), refs.commit.clone());

        self.identity = Some(identity);
        self.image_refs = Some(refs);
        Ok(())
    }

    pub fn image_refs(&self) -> TagflowResult<&ImageRefs> {
        self.image_refs.as_ref().ok_or(TagflowError::ImageRefsMissing)
    }

    pub fn identity(&self) -> Option<&BuildIdentity> {
        self.identity.as_ref()
    }

    /// Label for the run; just the build number until metadata is known
    pub fn display_label(&self) -> String {
        match self.identity {
            Some(ref identity) => identity.display_label(),
            None => format!("#{}", self.build_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::metadata::CommitRef;

    fn metadata() -> (BuildIdentity, ImageRefs) {
        let identity = BuildIdentity::new(42, CommitRef::Hash("abc1234".into()));
        let refs = ImageRefs::compute("reg:5000", "svc", &identity);
        (identity, refs)
    }

    #[test]
    fn test_seeded_from_parameters() {
        let env = RunEnvironment::new(&Parameters::default(), 42);
        assert_eq!(env.get("BUILD_NUMBER"), Some("42"));
        assert_eq!(env.get("DOCKERFILE"), Some("Dockerfile"));
        assert_eq!(env.display_label(), "#42");
        assert!(env.image_refs().is_err());
    }

    #[test]
    fn test_metadata_recorded_once() {
        let mut env = RunEnvironment::new(&Parameters::default(), 42);
        let (identity, refs) = metadata();

        env.record_metadata(identity.clone(), refs.clone()).unwrap();
        assert_eq!(env.get(IMAGE_BUILD), Some("reg:5000/svc:42"));
        assert_eq!(env.get(GIT_COMMIT_SHORT), Some("abc1234"));
        assert_eq!(env.display_label(), "#42 abc1234");

        assert!(matches!(
            env.record_metadata(identity, refs),
            Err(TagflowError::ImageRefAlreadySet { .. })
        ));
    }

    #[test]
    fn test_image_keys_not_settable_directly() {
        let mut env = RunEnvironment::new(&Parameters::default(), 1);
        assert!(env.set(IMAGE_LATEST, "other:latest").is_err());
        assert!(env.set("EXTRA", "value").is_ok());
        assert_eq!(env.get("EXTRA"), Some("value"));
    }
}
