//! OCI image layout reading.
//!
//! Loads the manifest and configuration of an image stored as an OCI image
//! layout directory, exposing the pieces a rebase needs: labels, layer
//! diff ids and the stored layer blobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use oci_distribution::manifest::OciImageManifest;
use oci_spec::image::ImageIndex;
use serde::Deserialize;
use stackport_core::error::{RebaseError, Result};

use super::digest::Digest;

/// Stored form of a layer blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub media_type: String,
    /// Digest of the stored (usually compressed) blob
    pub digest: String,
    pub size: u64,
}

/// An image loaded from an OCI image layout on disk.
#[derive(Debug)]
pub struct OciImage {
    root_dir: PathBuf,

    /// Layer blobs, bottom to top
    layers: Vec<LayerDescriptor>,

    /// Layer diff ids, bottom to top
    diff_ids: Vec<String>,

    labels: HashMap<String, String>,

    /// Config blob exactly as stored
    raw_config: Vec<u8>,
}

impl OciImage {
    /// Load an OCI image from a directory.
    ///
    /// The directory must contain `oci-layout`, `index.json` and a `blobs/`
    /// tree holding the manifest, config and layers. The manifest must list
    /// as many layers as the config lists diff ids.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let root_dir = path.as_ref().to_path_buf();

        Self::validate_oci_layout(&root_dir)?;

        let index = Self::load_index(&root_dir)?;
        let manifest_digest = index
            .manifests()
            .first()
            .ok_or_else(|| RebaseError::OciImageError("No manifests in index.json".to_string()))?
            .digest()
            .to_string();

        let manifest: OciImageManifest =
            serde_json::from_slice(&Self::read_blob(&root_dir, &manifest_digest, "manifest")?)
                .map_err(|e| {
                    RebaseError::OciImageError(format!("Failed to parse manifest: {}", e))
                })?;

        let raw_config = Self::read_blob(&root_dir, &manifest.config.digest, "config")?;
        let (labels, diff_ids) = parse_config(&raw_config)?;

        let layers: Vec<LayerDescriptor> = manifest
            .layers
            .iter()
            .map(|layer| LayerDescriptor {
                media_type: layer.media_type.clone(),
                digest: layer.digest.clone(),
                size: layer.size.max(0) as u64,
            })
            .collect();

        if layers.len() != diff_ids.len() {
            return Err(RebaseError::OciImageError(format!(
                "Image at {} lists {} layers but {} diff ids",
                root_dir.display(),
                layers.len(),
                diff_ids.len()
            )));
        }

        Ok(Self {
            root_dir,
            layers,
            diff_ids,
            labels,
            raw_config,
        })
    }

    /// Layer blob descriptors, bottom to top.
    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    /// Layer diff ids, bottom to top.
    pub fn diff_ids(&self) -> &[String] {
        &self.diff_ids
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    pub fn raw_config(&self) -> &[u8] {
        &self.raw_config
    }

    /// Path of a blob inside this layout.
    pub fn blob_path(&self, digest: &str) -> PathBuf {
        blob_path(&self.root_dir, digest)
    }

    fn validate_oci_layout(root_dir: &Path) -> Result<()> {
        for entry in ["oci-layout", "index.json", "blobs"] {
            if !root_dir.join(entry).exists() {
                return Err(RebaseError::OciImageError(format!(
                    "Not a valid OCI layout: missing {} in {}",
                    entry,
                    root_dir.display()
                )));
            }
        }
        Ok(())
    }

    fn load_index(root_dir: &Path) -> Result<ImageIndex> {
        let index_path = root_dir.join("index.json");
        let content = std::fs::read_to_string(&index_path).map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to read index.json at {}: {}",
                index_path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            RebaseError::OciImageError(format!("Failed to parse index.json: {}", e))
        })
    }

    fn read_blob(root_dir: &Path, digest: &str, what: &str) -> Result<Vec<u8>> {
        let path = blob_path(root_dir, digest);
        std::fs::read(&path).map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to read {} at {}: {}",
                what,
                path.display(),
                e
            ))
        })
    }
}

/// The parts of an image configuration a rebase reads. Everything else,
/// `history` included, is optional and ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    config: Option<ContainerConfig>,
    rootfs: Option<RootFs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerConfig {
    #[serde(rename = "Labels")]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RootFs {
    diff_ids: Option<Vec<String>>,
}

/// Extract labels and diff ids from a raw image configuration.
pub fn parse_config(raw: &[u8]) -> Result<(HashMap<String, String>, Vec<String>)> {
    let config: ConfigFile = serde_json::from_slice(raw)
        .map_err(|e| RebaseError::OciImageError(format!("Failed to parse config: {}", e)))?;

    let labels = config.config.and_then(|c| c.labels).unwrap_or_default();
    let diff_ids = config.rootfs.and_then(|r| r.diff_ids).unwrap_or_default();

    Ok((labels, diff_ids))
}

/// Get the path to a blob by digest.
pub fn blob_path(root_dir: &Path, digest: &str) -> PathBuf {
    match Digest::parse(digest) {
        Ok(d) => root_dir.join("blobs").join(d.algorithm).join(d.hex),
        Err(_) => root_dir.join("blobs").join("sha256").join(digest),
    }
}
