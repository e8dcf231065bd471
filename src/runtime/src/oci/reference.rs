//! Image reference parsing.
//!
//! Splits references like `registry.example.com/app/web:v2` into registry,
//! repository, tag and digest so that stack build images can be matched
//! against the registry host of a target repository.

use stackport_core::error::{RebaseError, Result};

/// Registry assumed when a reference names none.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag assumed when a reference names neither tag nor digest.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname, with port if any (e.g., "ghcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "library/ubuntu", "packs/build")
    pub repository: String,
    /// Tag (e.g., "latest", "bionic")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// - `ubuntu` → docker.io/library/ubuntu:latest
    /// - `packs/build` → docker.io/packs/build:latest
    /// - `registry.com/build/image:v1` → registry.com/build/image:v1
    /// - `localhost:5000/app@sha256:…` → digest reference, no tag
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(RebaseError::OciImageError(
                "Empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name, digest)) => {
                if !digest.contains(':') {
                    return Err(RebaseError::OciImageError(format!(
                        "Invalid digest format in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        let (registry, repository) = split_registry(name, reference)?;

        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag.map(str::to_string),
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Registry host of a reference string, if it parses.
    pub fn host_of(reference: &str) -> Option<String> {
        Self::parse(reference).ok().map(|r| r.registry)
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

/// Split `name[:tag]`. A colon only starts a tag after the last slash, and a
/// bare `host:port` with no slash is treated as a name.
fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
    let last_segment_start = name_tag.rfind('/').map_or(0, |pos| pos + 1);
    match name_tag[last_segment_start..].rfind(':') {
        Some(colon) => {
            let split_at = last_segment_start + colon;
            let tag = &name_tag[split_at + 1..];
            let is_port = last_segment_start == 0 && tag.chars().all(|c| c.is_ascii_digit());
            if is_port {
                (name_tag, None)
            } else {
                (&name_tag[..split_at], Some(tag))
            }
        }
        None => (name_tag, None),
    }
}

/// Split a name into registry and repository. The first path component is a
/// registry when it contains a dot or colon, or is `localhost`.
fn split_registry(name: &str, original: &str) -> Result<(String, String)> {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if rest.is_empty() {
                return Err(RebaseError::OciImageError(format!(
                    "Empty repository in reference '{}'",
                    original
                )));
            }
            return Ok((first.to_string(), rest.to_string()));
        }
        return Ok((DEFAULT_REGISTRY.to_string(), name.to_string()));
    }

    Ok((DEFAULT_REGISTRY.to_string(), format!("library/{}", name)))
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_name() {
        let r = ImageReference::parse("ubuntu").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/ubuntu");
        assert_eq!(r.tag, Some("latest".to_string()));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_user_repo() {
        let r = ImageReference::parse("default/build").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "default/build");
        assert_eq!(r.tag, Some("latest".to_string()));
    }

    #[test]
    fn test_parse_registry_repo_tag() {
        let r = ImageReference::parse("registry.com/build/image:bionic").unwrap();
        assert_eq!(r.registry, "registry.com");
        assert_eq!(r.repository, "build/image");
        assert_eq!(r.tag, Some("bionic".to_string()));
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/app:v1").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag, Some("v1".to_string()));
    }

    #[test]
    fn test_parse_single_name_with_tag() {
        let r = ImageReference::parse("ubuntu:18.04").unwrap();
        assert_eq!(r.repository, "library/ubuntu");
        assert_eq!(r.tag, Some("18.04".to_string()));
    }

    #[test]
    fn test_parse_digest_only() {
        let r = ImageReference::parse("ghcr.io/org/app@sha256:abcdef0123").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "org/app");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest, Some("sha256:abcdef0123".to_string()));
    }

    #[test]
    fn test_parse_tag_and_digest() {
        let r = ImageReference::parse("ghcr.io/org/app:v2@sha256:abcdef").unwrap();
        assert_eq!(r.tag, Some("v2".to_string()));
        assert_eq!(r.digest, Some("sha256:abcdef".to_string()));
        assert_eq!(r.full_reference(), "ghcr.io/org/app:v2@sha256:abcdef");
    }

    #[test]
    fn test_parse_rejects_empty_and_bad_digest() {
        assert!(ImageReference::parse("   ").is_err());
        assert!(ImageReference::parse("app@nodigest").is_err());
        assert!(ImageReference::parse("registry.com/").is_err());
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            ImageReference::host_of("host2.example/app"),
            Some("host2.example".to_string())
        );
        assert_eq!(ImageReference::host_of("host1/a"), Some("docker.io".to_string()));
        assert_eq!(ImageReference::host_of(""), None);
    }

    #[test]
    fn test_display() {
        let r = ImageReference::parse("some/image").unwrap();
        assert_eq!(format!("{}", r), "docker.io/some/image:latest");
    }
}
