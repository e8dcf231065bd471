//! Registry backing: images read from and written to a registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oci_distribution::manifest::OciDescriptor;
use stackport_core::error::{RebaseError, Result};

use super::{Image, Layer, WritableStore};
use crate::oci::{
    parse_config, write_layout, Digest, ImageReference, LayerDescriptor, RegistryPuller,
    RegistryPusher, RemoteManifest,
};
use crate::rebase::RebasedImage;

/// An image whose manifest and config were fetched from a registry.
/// Layer blobs are downloaded only when read.
pub struct RemoteImage {
    reference: String,
    source: ImageReference,
    remote: RemoteManifest,
    labels: HashMap<String, String>,
    diff_ids: Vec<String>,
    registry: Arc<RegistryPuller>,
}

impl RemoteImage {
    /// Fetch the manifest and config of `source`.
    pub async fn fetch(
        reference: impl Into<String>,
        source: ImageReference,
        registry: Arc<RegistryPuller>,
    ) -> Result<Self> {
        let remote = registry.fetch_manifest(&source).await?;
        let (labels, diff_ids) = parse_config(&remote.config)?;

        if remote.manifest.layers.len() != diff_ids.len() {
            return Err(RebaseError::OciImageError(format!(
                "{} lists {} layers but {} diff ids",
                source,
                remote.manifest.layers.len(),
                diff_ids.len()
            )));
        }

        Ok(Self {
            reference: reference.into(),
            source,
            remote,
            labels,
            diff_ids,
            registry,
        })
    }
}

impl Image for RemoteImage {
    fn reference(&self) -> &str {
        &self.reference
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    fn raw_config(&self) -> &[u8] {
        &self.remote.config
    }

    fn layers(&self) -> Result<Vec<Arc<dyn Layer>>> {
        Ok(self
            .remote
            .manifest
            .layers
            .iter()
            .zip(&self.diff_ids)
            .map(|(layer, diff_id)| {
                Arc::new(RemoteLayer {
                    source: self.source.clone(),
                    diff_id: diff_id.clone(),
                    descriptor: LayerDescriptor {
                        media_type: layer.media_type.clone(),
                        digest: layer.digest.clone(),
                        size: layer.size.max(0) as u64,
                    },
                    blob: layer.clone(),
                    registry: self.registry.clone(),
                }) as Arc<dyn Layer>
            })
            .collect())
    }
}

/// A layer blob living in a registry repository.
pub struct RemoteLayer {
    source: ImageReference,
    diff_id: String,
    descriptor: LayerDescriptor,
    blob: OciDescriptor,
    registry: Arc<RegistryPuller>,
}

#[async_trait]
impl Layer for RemoteLayer {
    fn diff_id(&self) -> Result<Digest> {
        Digest::parse(&self.diff_id)
    }

    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    async fn read_blob(&self) -> Result<Vec<u8>> {
        self.registry.pull_layer(&self.source, &self.blob).await
    }
}

/// Pushes rebased images to a registry repository.
pub struct RegistryStore {
    reference: ImageReference,
    name: String,
    pusher: Arc<RegistryPusher>,
}

impl RegistryStore {
    pub fn new(reference: ImageReference, pusher: Arc<RegistryPusher>) -> Self {
        Self {
            name: reference.full_reference(),
            reference,
            pusher,
        }
    }
}

#[async_trait]
impl WritableStore for RegistryStore {
    fn reference(&self) -> &str {
        &self.name
    }

    /// Stage the image as an OCI layout in a temp dir, then push it.
    async fn write(&self, image: &RebasedImage) -> Result<String> {
        let staging = tempfile::tempdir().map_err(|e| {
            RebaseError::OciImageError(format!("Failed to create staging directory: {}", e))
        })?;

        let layers = image.layout_layers().await?;
        let layout_digest = write_layout(staging.path(), &image.config, &layers)?.to_string();
        let pushed = self.pusher.push(&self.reference, staging.path()).await?;
        // The registry may serialize the manifest differently from the staged copy.
        let digest = pushed.manifest_digest.unwrap_or(layout_digest);

        tracing::info!(
            reference = %self.reference,
            digest = %digest,
            manifest_url = %pushed.manifest_url,
            "Pushed rebased image"
        );
        Ok(digest)
    }
}
