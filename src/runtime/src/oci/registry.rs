//! OCI registry client for pulling and pushing images.
//!
//! Uses the `oci-distribution` crate to talk to container registries
//! (Docker Hub, GHCR, etc.).

use std::path::Path;

use oci_distribution::client::{ClientConfig, ClientProtocol, Config, ImageLayer, PushResponse};
use oci_distribution::manifest::{ImageIndexEntry, OciDescriptor, OciImageManifest};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use stackport_core::error::{RebaseError, Result};

use super::digest::Digest;
use super::image::blob_path;
use super::layout::{write_layout, LayoutLayer};
use super::reference::ImageReference;

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Read `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`, falling back to anonymous.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Manifest and config of an image as served by a registry.
#[derive(Debug, Clone)]
pub struct RemoteManifest {
    pub manifest: OciImageManifest,
    pub digest: String,
    pub config: Vec<u8>,
}

/// Reads images from container registries.
pub struct RegistryPuller {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryPuller {
    /// Create a new registry puller with anonymous authentication.
    pub fn new() -> Self {
        Self::with_auth(RegistryAuth::anonymous())
    }

    /// Create a new registry puller with the given authentication.
    pub fn with_auth(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            platform_resolver: Some(Box::new(linux_platform_resolver)),
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth,
        }
    }

    /// Fetch the manifest and config of an image without its layers.
    ///
    /// Multi-arch indexes resolve to the linux image for the host CPU.
    pub async fn fetch_manifest(&self, reference: &ImageReference) -> Result<RemoteManifest> {
        let oci_ref = to_oci_reference(reference)?;
        let auth = self.auth.to_oci_auth();

        let (manifest, digest, config) = self
            .client
            .pull_manifest_and_config(&oci_ref, &auth)
            .await
            .map_err(|e| RebaseError::RegistryError {
                registry: reference.registry.clone(),
                message: format!("Failed to pull manifest for {}: {}", reference, e),
            })?;

        tracing::debug!(
            reference = %reference,
            digest = %digest,
            layers = manifest.layers.len(),
            "Fetched manifest"
        );

        Ok(RemoteManifest {
            manifest,
            digest,
            config: config.into_bytes(),
        })
    }

    /// Download one layer blob.
    ///
    /// The registry session is established by a prior `fetch_manifest` for
    /// the same repository.
    pub async fn pull_layer(
        &self,
        reference: &ImageReference,
        layer: &OciDescriptor,
    ) -> Result<Vec<u8>> {
        let oci_ref = to_oci_reference(reference)?;

        tracing::debug!(digest = %layer.digest, size = layer.size, "Pulling layer");

        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, layer, &mut data)
            .await
            .map_err(|e| RebaseError::RegistryError {
                registry: reference.registry.clone(),
                message: format!("Failed to pull layer {}: {}", layer.digest, e),
            })?;
        Ok(data)
    }

    /// Pull an image and write it as an OCI image layout to `target_dir`.
    ///
    /// Returns the registry's manifest digest.
    pub async fn pull(&self, reference: &ImageReference, target_dir: &Path) -> Result<String> {
        tracing::info!(
            reference = %reference,
            target = %target_dir.display(),
            "Pulling image from registry"
        );

        let remote = self.fetch_manifest(reference).await?;

        let mut layers = Vec::with_capacity(remote.manifest.layers.len());
        for layer in &remote.manifest.layers {
            layers.push(LayoutLayer {
                media_type: layer.media_type.clone(),
                data: self.pull_layer(reference, layer).await?,
            });
        }

        write_layout(target_dir, &remote.config, &layers)?;

        tracing::info!(
            reference = %reference,
            digest = %remote.digest,
            "Image pulled successfully"
        );

        Ok(remote.digest)
    }
}

impl Default for RegistryPuller {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful image push.
#[derive(Debug, Clone)]
pub struct PushResult {
    /// URL of the pushed manifest.
    pub manifest_url: String,
    /// Manifest digest as stored by the registry, when the manifest URL
    /// names one.
    pub manifest_digest: Option<String>,
}

/// Pushes OCI images to container registries.
pub struct RegistryPusher {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryPusher {
    /// Create a new registry pusher with the given authentication.
    pub fn with_auth(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth,
        }
    }

    /// Push a local OCI image layout to a registry.
    ///
    /// Reads `index.json` → manifest → config + layers from `image_dir` and
    /// uploads all blobs and the manifest to `reference`.
    pub async fn push(&self, reference: &ImageReference, image_dir: &Path) -> Result<PushResult> {
        let oci_ref = to_oci_reference(reference)?;

        tracing::info!(
            reference = %reference,
            source = %image_dir.display(),
            "Pushing image to registry"
        );

        let index: serde_json::Value =
            serde_json::from_slice(&read_layout_file(&image_dir.join("index.json"))?)?;
        let manifest_digest = index["manifests"][0]["digest"].as_str().ok_or_else(|| {
            RebaseError::OciImageError("No manifest digest in index.json".to_string())
        })?;

        let manifest: OciImageManifest =
            serde_json::from_slice(&read_layout_file(&blob_path(image_dir, manifest_digest))?)?;

        let config_data = read_layout_file(&blob_path(image_dir, &manifest.config.digest))?;
        let config = Config::new(config_data, manifest.config.media_type.clone(), None);

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for layer_desc in &manifest.layers {
            let layer_data = read_layout_file(&blob_path(image_dir, &layer_desc.digest))?;
            tracing::debug!(
                digest = %layer_desc.digest,
                size = layer_data.len(),
                "Read layer for push"
            );
            layers.push(ImageLayer::new(
                layer_data,
                layer_desc.media_type.clone(),
                None,
            ));
        }

        let auth = self.auth.to_oci_auth();
        let response: PushResponse = self
            .client
            .push(&oci_ref, &layers, config, &auth, Some(manifest))
            .await
            .map_err(|e| RebaseError::RegistryError {
                registry: reference.registry.clone(),
                message: format!("Failed to push image: {}", e),
            })?;

        tracing::info!(
            reference = %reference,
            manifest_url = %response.manifest_url,
            "Image pushed successfully"
        );

        Ok(PushResult {
            manifest_digest: manifest_digest_from_url(&response.manifest_url),
            manifest_url: response.manifest_url,
        })
    }
}

/// Digest at the end of a `.../manifests/<algorithm>:<hex>` URL.
fn manifest_digest_from_url(url: &str) -> Option<String> {
    let (_, last) = url.rsplit_once("/manifests/")?;
    let last = last.split(['?', '#']).next()?;
    if !last.contains(':') {
        return None;
    }
    Digest::parse(last).ok().map(|d| d.to_string())
}

fn read_layout_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        RebaseError::OciImageError(format!("Failed to read {}: {}", path.display(), e))
    })
}

/// Convert an ImageReference to an oci-distribution Reference.
fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = match (&reference.digest, &reference.tag) {
        (Some(digest), _) => format!("{}/{}@{}", reference.registry, reference.repository, digest),
        (None, Some(tag)) => format!("{}/{}:{}", reference.registry, reference.repository, tag),
        (None, None) => format!("{}/{}:latest", reference.registry, reference.repository),
    };

    ref_str.parse::<Reference>().map_err(|e| {
        RebaseError::OciImageError(format!("Invalid OCI reference '{}': {}", ref_str, e))
    })
}

/// Platform resolver that selects linux images matching the host architecture.
fn linux_platform_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };

    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .map_or(false, |p| p.os == "linux" && p.architecture == arch)
        })
        .map(|entry| entry.digest.clone())
}
