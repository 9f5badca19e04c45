//! Image reference normalization.
//!
//! Canonicalizes user-supplied tag strings into fully-qualified references
//! following the docker reference grammar: an implicit `docker.io` domain, an
//! implicit `library/` namespace for single-component official repositories,
//! and an implicit `latest` tag when neither tag nor digest is present.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{DEFAULT_DOMAIN, DEFAULT_TAG, OFFICIAL_REPO_NAMESPACE};
use crate::error::BuildError;

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?$").unwrap()
});

static REPO_COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*$").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").unwrap());

static DIGEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:[+._-][a-z0-9]+)*:[0-9a-fA-F]{32,}$").unwrap());

/// A validated, fully-qualified image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReference {
    domain: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl NormalizedReference {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl fmt::Display for NormalizedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Normalizes a raw reference string, or fails with `InvalidReference`.
pub fn normalize(raw: &str) -> Result<NormalizedReference, BuildError> {
    if raw.is_empty() {
        return Err(BuildError::invalid_reference(raw, "empty reference"));
    }

    let (name, digest) = match raw.split_once('@') {
        Some((name, digest)) => {
            if !DIGEST_RE.is_match(digest) {
                return Err(BuildError::invalid_reference(raw, "invalid digest"));
            }
            (name, Some(digest.to_string()))
        }
        None => (raw, None),
    };

    // The first path segment is a registry domain only when it can be one:
    // it contains a dot or a port, or is the literal "localhost".
    let (domain, remainder) = match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first.to_string(), rest)
        }
        _ => (DEFAULT_DOMAIN.to_string(), name),
    };

    if !DOMAIN_RE.is_match(&domain) {
        return Err(BuildError::invalid_reference(raw, "invalid registry domain"));
    }

    // Any colon left in the remainder separates the tag; the domain (and its
    // port) has already been split off.
    let (repository, tag) = match remainder.rsplit_once(':') {
        Some((repo, tag)) => {
            if !TAG_RE.is_match(tag) {
                return Err(BuildError::invalid_reference(raw, "invalid tag"));
            }
            (repo.to_string(), Some(tag.to_string()))
        }
        None => (remainder.to_string(), None),
    };

    if repository.is_empty() {
        return Err(BuildError::invalid_reference(raw, "empty repository"));
    }
    for component in repository.split('/') {
        if !REPO_COMPONENT_RE.is_match(component) {
            return Err(BuildError::invalid_reference(
                raw,
                format!("invalid repository component {:?}", component),
            ));
        }
    }

    let repository = if domain == DEFAULT_DOMAIN && !repository.contains('/') {
        format!("{}/{}", OFFICIAL_REPO_NAMESPACE, repository)
    } else {
        repository
    };

    let tag = match (&tag, &digest) {
        (None, None) => Some(DEFAULT_TAG.to_string()),
        _ => tag,
    };

    Ok(NormalizedReference {
        domain,
        repository,
        tag,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_official_single_component() {
        let r = normalize("myimg:latest").unwrap();
        assert_eq!(r.to_string(), "docker.io/library/myimg:latest");
    }

    #[test]
    fn test_default_tag_applied() {
        let r = normalize("ubuntu").unwrap();
        assert_eq!(r.to_string(), "docker.io/library/ubuntu:latest");
    }

    #[test]
    fn test_explicit_registry_with_port() {
        let r = normalize("localhost:5000/team/app:v1.2").unwrap();
        assert_eq!(r.domain(), "localhost:5000");
        assert_eq!(r.repository(), "team/app");
        assert_eq!(r.to_string(), "localhost:5000/team/app:v1.2");
    }

    #[test]
    fn test_namespaced_repo_keeps_namespace() {
        let r = normalize("rancher/kim:dev").unwrap();
        assert_eq!(r.to_string(), "docker.io/rancher/kim:dev");
    }

    #[test]
    fn test_digest_reference_gets_no_default_tag() {
        let digest = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let r = normalize(&format!("ghcr.io/org/app@{}", digest)).unwrap();
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest(), Some(digest));
        assert_eq!(r.to_string(), format!("ghcr.io/org/app@{}", digest));
    }

    #[test]
    fn test_whitespace_is_invalid() {
        assert!(normalize("bad ref").is_err());
    }

    #[test]
    fn test_uppercase_repository_is_invalid() {
        assert!(normalize("MyImg:latest").is_err());
    }

    #[test]
    fn test_empty_reference_is_invalid() {
        assert!(normalize("").is_err());
    }

    #[test]
    fn test_overlong_tag_is_invalid() {
        let tag: String = std::iter::repeat('a').take(129).collect();
        assert!(normalize(&format!("myimg:{}", tag)).is_err());
    }
}
