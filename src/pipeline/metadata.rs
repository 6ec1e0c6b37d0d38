// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Build identity and image references
//!
//! Every run produces three references to the same image:
//! `<host>/<image>:latest`, `<host>/<image>:<build-number>` and
//! `<host>/<image>:<short-commit>`. Only the tag differs between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commit tag used when no version control metadata is available
pub const NO_GIT: &str = "nogit";

/// Tag that always points at the newest build
pub const LATEST: &str = "latest";

/// Short commit hash of the source, if there is one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRef {
    Hash(String),
    Unavailable,
}

impl CommitRef {
    /// From the result of a hash lookup; `None` falls back to `nogit`
    pub fn from_lookup(hash: Option<String>) -> Self {
        match hash {
            Some(h) if !h.trim().is_empty() => Self::Hash(h.trim().to_string()),
            _ => Self::Unavailable,
        }
    }

    /// The tag segment for this commit
    pub fn tag(&self) -> &str {
        match self {
            Self::Hash(h) => h,
            Self::Unavailable => NO_GIT,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Hash(_))
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Build number plus commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    pub build_number: u64,
    pub commit: CommitRef,
}

impl BuildIdentity {
    pub fn new(build_number: u64, commit: CommitRef) -> Self {
        Self {
            build_number,
            commit,
        }
    }

    /// Label shown for the run, e.g. `#42 abc1234`
    pub fn display_label(&self) -> String {
        format!("#{} {}", self.build_number, self.commit)
    }
}

/// The three fully-qualified references of one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRefs {
    pub latest: String,
    pub build: String,
    pub commit: String,
}

impl ImageRefs {
    /// `"{host}/{image}:{tag}"` for latest, the build number and the commit
    pub fn compute(registry_host: &str, image_name: &str, identity: &BuildIdentity) -> Self {
        let reference = |tag: &str| format!("{}/{}:{}", registry_host, image_name, tag);

        Self {
            latest: reference(LATEST),
            build: reference(&identity.build_number.to_string()),
            commit: reference(identity.commit.tag()),
        }
    }

    /// All references, in build-tag order
    pub fn all(&self) -> [&str; 3] {
        [&self.latest, &self.build, &self.commit]
    }

    /// Push order: build number, commit, latest
    pub fn push_order(&self) -> [&str; 3] {
        [&self.build, &self.commit, &self.latest]
    }
}

/// Split a reference into `(repository, tag)` at the last colon after the last slash
pub fn split_reference(reference: &str) -> (&str, Option<&str>) {
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => (
            &reference[..name_start + i],
            Some(&reference[name_start + i + 1..]),
        ),
        None => (reference, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(build: u64, hash: Option<&str>) -> BuildIdentity {
        BuildIdentity::new(build, CommitRef::from_lookup(hash.map(str::to_string)))
    }

    #[test]
    fn test_reference_scenario() {
        let id = identity(42, Some("abc1234"));
        let refs = ImageRefs::compute("reg:5000", "svc", &id);

        assert_eq!(refs.latest, "reg:5000/svc:latest");
        assert_eq!(refs.build, "reg:5000/svc:42");
        assert_eq!(refs.commit, "reg:5000/svc:abc1234");
        assert_eq!(id.display_label(), "#42 abc1234");
    }

    #[test]
    fn test_missing_commit_falls_back_to_nogit() {
        let id = identity(42, None);
        let refs = ImageRefs::compute("reg:5000", "svc", &id);

        assert_eq!(refs.commit, "reg:5000/svc:nogit");
        assert_eq!(id.display_label(), "#42 nogit");
        assert!(!id.commit.is_available());
    }

    #[test]
    fn test_blank_hash_is_unavailable() {
        assert_eq!(CommitRef::from_lookup(Some("  \n".into())), CommitRef::Unavailable);
    }

    #[test]
    fn test_references_differ_only_in_tag() {
        for (host, image, build, hash) in [
            ("reg:5000", "svc", 1, Some("deadbee")),
            ("host.minikube.internal:5000", "team/app", 900, None),
            ("localhost", "a", 0, Some("0000000")),
        ] {
            let refs = ImageRefs::compute(host, image, &identity(build, hash));
            let repo = format!("{}/{}", host, image);

            for reference in refs.all() {
                let (repository, tag) = split_reference(reference);
                assert_eq!(repository, repo);
                assert!(tag.is_some());
            }
        }
    }

    #[test]
    fn test_build_and_commit_tags_never_collide() {
        let refs = ImageRefs::compute("reg:5000", "svc", &identity(42, None));
        assert_ne!(refs.build, refs.commit);
    }

    #[test]
    fn test_push_order() {
        let refs = ImageRefs::compute("reg:5000", "svc", &identity(42, Some("abc1234")));
        assert_eq!(
            refs.push_order(),
            ["reg:5000/svc:42", "reg:5000/svc:abc1234", "reg:5000/svc:latest"]
        );
    }

    #[test]
    fn test_split_reference_keeps_port() {
        assert_eq!(split_reference("reg:5000/svc:42"), ("reg:5000/svc", Some("42")));
        assert_eq!(split_reference("reg:5000/svc"), ("reg:5000/svc", None));
    }
}
