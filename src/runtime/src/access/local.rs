//! Daemon backing: the local image store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use stackport_core::error::{RebaseError, Result};

use super::{Image, ImageDaemon, ImageInspect, Layer, WritableStore};
use crate::oci::{
    write_layout, Digest, ImagePuller, ImageReference, ImageStore, LayerDescriptor, OciImage,
    RegistryPuller,
};
use crate::rebase::RebasedImage;

/// Pull and inspect against the local image store.
pub struct LocalDaemon {
    store: Arc<ImageStore>,
    puller: ImagePuller,
}

impl LocalDaemon {
    /// `registry` is used to refresh stored images on pull.
    pub fn new(store: Arc<ImageStore>, registry: Arc<RegistryPuller>) -> Self {
        let puller = ImagePuller::new(store.clone(), registry);
        Self { store, puller }
    }
}

#[async_trait]
impl ImageDaemon for LocalDaemon {
    async fn pull_image(&self, reference: &str) -> Result<()> {
        let parsed = ImageReference::parse(reference).map_err(|e| RebaseError::PullFailed {
            reference: reference.to_string(),
            message: e.to_string(),
        })?;

        let stored = self
            .puller
            .refresh(&parsed)
            .await
            .map_err(|e| RebaseError::PullFailed {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(reference, digest = %stored.digest, "Pulled image");
        Ok(())
    }

    /// Labels of the stored copy.
    async fn inspect_image_config(&self, reference: &str) -> Result<ImageInspect> {
        let not_found = |e: RebaseError| RebaseError::ImageNotFound {
            reference: reference.to_string(),
            message: e.to_string(),
        };

        let parsed = ImageReference::parse(reference).map_err(not_found)?;

        let stored = self
            .store
            .get(&parsed.full_reference())
            .await
            .ok_or_else(|| RebaseError::ImageNotFound {
                reference: reference.to_string(),
                message: "not present in local image store".to_string(),
            })?;

        let image = OciImage::from_path(&stored.path).map_err(not_found)?;
        Ok(ImageInspect {
            labels: image.labels().clone(),
        })
    }
}

/// An image read from the local store.
pub struct LocalImage {
    reference: String,
    image: OciImage,
}

impl LocalImage {
    pub fn new(reference: impl Into<String>, image: OciImage) -> Self {
        Self {
            reference: reference.into(),
            image,
        }
    }
}

impl Image for LocalImage {
    fn reference(&self) -> &str {
        &self.reference
    }

    fn labels(&self) -> &HashMap<String, String> {
        self.image.labels()
    }

    fn raw_config(&self) -> &[u8] {
        self.image.raw_config()
    }

    fn layers(&self) -> Result<Vec<Arc<dyn Layer>>> {
        Ok(self
            .image
            .layers()
            .iter()
            .zip(self.image.diff_ids())
            .map(|(descriptor, diff_id)| {
                Arc::new(LocalLayer {
                    diff_id: diff_id.clone(),
                    blob: self.image.blob_path(&descriptor.digest),
                    descriptor: descriptor.clone(),
                }) as Arc<dyn Layer>
            })
            .collect())
    }
}

/// A layer blob inside a stored layout.
pub struct LocalLayer {
    diff_id: String,
    descriptor: LayerDescriptor,
    blob: PathBuf,
}

#[async_trait]
impl Layer for LocalLayer {
    fn diff_id(&self) -> Result<Digest> {
        Digest::parse(&self.diff_id)
    }

    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    async fn read_blob(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.blob).await.map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to read layer blob {}: {}",
                self.blob.display(),
                e
            ))
        })
    }
}

/// Writes rebased images into the local store.
pub struct LocalStore {
    reference: ImageReference,
    name: String,
    store: Arc<ImageStore>,
}

impl LocalStore {
    pub fn new(reference: ImageReference, store: Arc<ImageStore>) -> Self {
        Self {
            name: reference.full_reference(),
            reference,
            store,
        }
    }
}

#[async_trait]
impl WritableStore for LocalStore {
    fn reference(&self) -> &str {
        &self.name
    }

    async fn write(&self, image: &RebasedImage) -> Result<String> {
        let staging = tempfile::Builder::new()
            .prefix("write-")
            .tempdir_in(self.store.store_dir())
            .map_err(|e| {
                RebaseError::OciImageError(format!("Failed to create staging directory: {}", e))
            })?;

        let layers = image.layout_layers().await?;
        let digest = write_layout(staging.path(), &image.config, &layers)?.to_string();
        self.store
            .put(&self.reference.full_reference(), &digest, staging.path())
            .await?;

        tracing::info!(reference = %self.reference, digest = %digest, "Wrote image to local store");
        Ok(digest)
    }
}
