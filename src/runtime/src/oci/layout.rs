//! OCI image layout writing.

use std::path::Path;

use stackport_core::error::{RebaseError, Result};

use super::digest::Digest;
use super::image::blob_path;

pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";

/// A layer blob to be written into a layout.
#[derive(Debug, Clone)]
pub struct LayoutLayer {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// Write a single-manifest OCI image layout into `dir`.
///
/// Blobs are addressed by the SHA-256 of their bytes. Returns the manifest
/// digest.
pub fn write_layout(dir: &Path, config: &[u8], layers: &[LayoutLayer]) -> Result<Digest> {
    std::fs::create_dir_all(dir.join("blobs").join("sha256")).map_err(|e| {
        RebaseError::OciImageError(format!(
            "Failed to create layout at {}: {}",
            dir.display(),
            e
        ))
    })?;

    let config_digest = write_blob(dir, config)?;

    let mut layer_entries = Vec::with_capacity(layers.len());
    for layer in layers {
        let digest = write_blob(dir, &layer.data)?;
        layer_entries.push(serde_json::json!({
            "mediaType": layer.media_type,
            "digest": digest.to_string(),
            "size": layer.data.len(),
        }));
    }

    let manifest = serde_json::json!({
        "schemaVersion": 2,
        "mediaType": OCI_MANIFEST_MEDIA_TYPE,
        "config": {
            "mediaType": OCI_CONFIG_MEDIA_TYPE,
            "digest": config_digest.to_string(),
            "size": config.len(),
        },
        "layers": layer_entries,
    });
    let manifest_json = serde_json::to_vec(&manifest)?;
    let manifest_digest = write_blob(dir, &manifest_json)?;

    let index = serde_json::json!({
        "schemaVersion": 2,
        "manifests": [{
            "mediaType": OCI_MANIFEST_MEDIA_TYPE,
            "digest": manifest_digest.to_string(),
            "size": manifest_json.len(),
        }]
    });
    write_file(dir, "index.json", &serde_json::to_vec_pretty(&index)?)?;
    write_file(dir, "oci-layout", br#"{"imageLayoutVersion":"1.0.0"}"#)?;

    tracing::debug!(
        dir = %dir.display(),
        digest = %manifest_digest,
        layers = layers.len(),
        "Wrote OCI layout"
    );

    Ok(manifest_digest)
}

fn write_blob(dir: &Path, data: &[u8]) -> Result<Digest> {
    let digest = Digest::sha256(data);
    let path = blob_path(dir, &digest.to_string());
    if !path.exists() {
        std::fs::write(&path, data).map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to write blob {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(digest)
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    std::fs::write(dir.join(name), data).map_err(|e| {
        RebaseError::OciImageError(format!("Failed to write {}: {}", name, e))
    })
}
