//! Registry → local store refresh.
//!
//! Combines the registry puller and the image store: an image is downloaded
//! into a staging directory and then indexed under its full reference. The
//! existing local copy is only replaced once the new one is complete.

use std::sync::Arc;

use stackport_core::error::{RebaseError, Result};

use super::reference::ImageReference;
use super::registry::RegistryPuller;
use super::store::{ImageStore, StoredImage};

/// Refreshes local images from their registries.
pub struct ImagePuller {
    store: Arc<ImageStore>,
    puller: Arc<RegistryPuller>,
}

impl ImagePuller {
    pub fn new(store: Arc<ImageStore>, puller: Arc<RegistryPuller>) -> Self {
        Self { store, puller }
    }

    /// Download the current version of `reference` into the store.
    pub async fn refresh(&self, reference: &ImageReference) -> Result<StoredImage> {
        let full_ref = reference.full_reference();

        let staging = tempfile::Builder::new()
            .prefix("pull-")
            .tempdir_in(self.store.store_dir())
            .map_err(|e| {
                RebaseError::OciImageError(format!("Failed to create staging directory: {}", e))
            })?;

        let digest = self.puller.pull(reference, staging.path()).await?;

        let stored = self.store.put(&full_ref, &digest, staging.path()).await?;

        let evicted = self.store.evict().await?;
        if !evicted.is_empty() {
            tracing::info!(
                count = evicted.len(),
                references = ?evicted,
                "Evicted images from store"
            );
        }

        Ok(stored)
    }
}
