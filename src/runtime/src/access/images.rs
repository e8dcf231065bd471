//! `ImageAccess` over the local store and registries.

use std::sync::Arc;

use async_trait::async_trait;
use stackport_core::error::{RebaseError, Result};

use super::{Image, ImageAccess, LocalImage, LocalStore, RegistryStore, RemoteImage, WritableStore};
use crate::oci::{ImageReference, ImageStore, OciImage, RegistryPuller, RegistryPusher};

/// Image access backed by the local image store (daemon) and remote
/// registries.
pub struct OciImages {
    store: Arc<ImageStore>,
    registry: Arc<RegistryPuller>,
    pusher: Arc<RegistryPusher>,
}

impl OciImages {
    pub fn new(
        store: Arc<ImageStore>,
        registry: Arc<RegistryPuller>,
        pusher: Arc<RegistryPusher>,
    ) -> Self {
        Self {
            store,
            registry,
            pusher,
        }
    }

    async fn read_local(&self, reference: &str, parsed: &ImageReference) -> Result<Arc<dyn Image>> {
        let stored = self
            .store
            .get(&parsed.full_reference())
            .await
            .ok_or_else(|| RebaseError::ImageNotFound {
                reference: reference.to_string(),
                message: "not present in local image store".to_string(),
            })?;

        let image = OciImage::from_path(&stored.path)?;
        Ok(Arc::new(LocalImage::new(reference, image)))
    }
}

#[async_trait]
impl ImageAccess for OciImages {
    async fn read_image(&self, reference: &str, use_daemon: bool) -> Result<Arc<dyn Image>> {
        let not_found = |e: RebaseError| match e {
            e @ RebaseError::ImageNotFound { .. } => e,
            e => RebaseError::ImageNotFound {
                reference: reference.to_string(),
                message: e.to_string(),
            },
        };

        let parsed = ImageReference::parse(reference).map_err(not_found)?;
        tracing::debug!(reference, use_daemon, "Reading image");

        if use_daemon {
            return self.read_local(reference, &parsed).await.map_err(not_found);
        }

        let image = RemoteImage::fetch(reference, parsed, self.registry.clone())
            .await
            .map_err(not_found)?;
        Ok(Arc::new(image))
    }

    async fn repo_store(
        &self,
        reference: &str,
        use_daemon: bool,
    ) -> Result<Arc<dyn WritableStore>> {
        let parsed =
            ImageReference::parse(reference).map_err(|e| RebaseError::StoreUnavailable {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        if use_daemon {
            Ok(Arc::new(LocalStore::new(parsed, self.store.clone())))
        } else {
            Ok(Arc::new(RegistryStore::new(parsed, self.pusher.clone())))
        }
    }
}
