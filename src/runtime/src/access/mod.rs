//! Image access capabilities.
//!
//! The rebase core never talks to a daemon or registry directly. It goes
//! through these traits, which have two backings:
//!
//! - **daemon**: the local image store (`local`), refreshed from registries
//!   on pull
//! - **registry**: manifests, configs and blobs fetched on demand (`remote`)
//!
//! `OciImages` picks the backing per call from the `use_daemon` flag.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use stackport_core::error::Result;

use crate::oci::{Digest, LayerDescriptor};
use crate::rebase::RebasedImage;

mod images;
mod local;
#[cfg(test)]
pub(crate) mod mock;
mod remote;

pub use images::OciImages;
pub use local::{LocalDaemon, LocalImage, LocalLayer, LocalStore};
pub use remote::{RegistryStore, RemoteImage, RemoteLayer};

/// Image configuration details returned by an inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInspect {
    pub labels: HashMap<String, String>,
}

/// Pull and inspect operations of the image daemon.
#[async_trait]
pub trait ImageDaemon: Send + Sync {
    /// Refresh the local copy of `reference` from its registry.
    async fn pull_image(&self, reference: &str) -> Result<()>;

    /// Read the configuration of `reference`.
    async fn inspect_image_config(&self, reference: &str) -> Result<ImageInspect>;
}

/// Read images and open writable stores against the daemon or a registry.
#[async_trait]
pub trait ImageAccess: Send + Sync {
    async fn read_image(&self, reference: &str, use_daemon: bool) -> Result<Arc<dyn Image>>;

    async fn repo_store(&self, reference: &str, use_daemon: bool)
        -> Result<Arc<dyn WritableStore>>;
}

/// A readable image.
pub trait Image: Send + Sync {
    /// Reference the image was read from.
    fn reference(&self) -> &str;

    fn labels(&self) -> &HashMap<String, String>;

    /// Image configuration blob as stored.
    fn raw_config(&self) -> &[u8];

    /// Layers from the filesystem root upward.
    fn layers(&self) -> Result<Vec<Arc<dyn Layer>>>;
}

/// A layer of an image.
#[async_trait]
pub trait Layer: Send + Sync {
    /// Digest of the uncompressed layer contents.
    fn diff_id(&self) -> Result<Digest>;

    /// How the layer blob is stored.
    fn descriptor(&self) -> &LayerDescriptor;

    async fn read_blob(&self) -> Result<Vec<u8>>;
}

/// Destination for a rebased image.
#[async_trait]
pub trait WritableStore: Send + Sync {
    /// Reference images are written under.
    fn reference(&self) -> &str;

    /// Write `image`, returning the manifest digest.
    async fn write(&self, image: &RebasedImage) -> Result<String>;
}
