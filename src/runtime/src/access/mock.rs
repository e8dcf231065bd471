//! In-memory collaborators for tests.
//!
//! Every call is appended to a shared `CallLog` so tests can assert on call
//! order across the daemon, image access and stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stackport_core::error::{RebaseError, Result};

use super::{Image, ImageAccess, ImageDaemon, ImageInspect, Layer, WritableStore};
use crate::oci::{Digest, LayerDescriptor};
use crate::rebase::RebasedImage;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Whether two layer handles point at the same layer.
pub(crate) fn same_layer(a: &Arc<dyn Layer>, b: &Arc<dyn Layer>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

pub(crate) struct MockLayer {
    diff_id: String,
    descriptor: LayerDescriptor,
    blob: Vec<u8>,
}

impl MockLayer {
    /// Layer with diff id `sha256:<hex>` and `blob` as its contents.
    pub(crate) fn new(hex: &str, blob: &str) -> Arc<dyn Layer> {
        Arc::new(Self {
            diff_id: format!("sha256:{}", hex),
            descriptor: LayerDescriptor {
                media_type: "application/vnd.oci.image.layer.v1.tar".to_string(),
                digest: Digest::sha256(blob.as_bytes()).to_string(),
                size: blob.len() as u64,
            },
            blob: blob.as_bytes().to_vec(),
        })
    }

    /// Layer whose diff id cannot be parsed.
    pub(crate) fn broken() -> Arc<dyn Layer> {
        Arc::new(Self {
            diff_id: String::new(),
            descriptor: LayerDescriptor {
                media_type: "application/vnd.oci.image.layer.v1.tar".to_string(),
                digest: String::new(),
                size: 0,
            },
            blob: Vec::new(),
        })
    }
}

#[async_trait]
impl Layer for MockLayer {
    fn diff_id(&self) -> Result<Digest> {
        Digest::parse(&self.diff_id)
    }

    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    async fn read_blob(&self) -> Result<Vec<u8>> {
        Ok(self.blob.clone())
    }
}

pub(crate) struct MockImage {
    reference: String,
    labels: HashMap<String, String>,
    config: Vec<u8>,
    layers: Vec<Arc<dyn Layer>>,
}

impl MockImage {
    pub(crate) fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            labels: HashMap::new(),
            config: b"{}".to_vec(),
            layers: Vec::new(),
        }
    }

    pub(crate) fn with_layers(mut self, layers: Vec<Arc<dyn Layer>>) -> Self {
        self.layers = layers;
        self
    }

    pub(crate) fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = serde_json::to_vec(&config).unwrap();
        self
    }

    pub(crate) fn build(self) -> Arc<dyn Image> {
        Arc::new(self)
    }
}

impl Image for MockImage {
    fn reference(&self) -> &str {
        &self.reference
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    fn raw_config(&self) -> &[u8] {
        &self.config
    }

    fn layers(&self) -> Result<Vec<Arc<dyn Layer>>> {
        Ok(self.layers.clone())
    }
}

/// Daemon that serves labels from memory and records pulls.
pub(crate) struct MockDaemon {
    log: CallLog,
    labels: HashMap<String, HashMap<String, String>>,
    fail_pull: bool,
}

impl MockDaemon {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            labels: HashMap::new(),
            fail_pull: false,
        }
    }

    pub(crate) fn with_label(mut self, reference: &str, key: &str, value: &str) -> Self {
        self.labels
            .entry(reference.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn failing_pulls(mut self) -> Self {
        self.fail_pull = true;
        self
    }
}

#[async_trait]
impl ImageDaemon for MockDaemon {
    async fn pull_image(&self, reference: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("pull {}", reference));
        if self.fail_pull {
            return Err(RebaseError::PullFailed {
                reference: reference.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn inspect_image_config(&self, reference: &str) -> Result<ImageInspect> {
        self.log.lock().unwrap().push(format!("inspect {}", reference));
        let labels = self.labels.get(reference).cloned().unwrap_or_default();
        Ok(ImageInspect { labels })
    }
}

/// Image access that hands out registered images and recording stores.
pub(crate) struct MockImages {
    log: CallLog,
    images: HashMap<String, Arc<dyn Image>>,
}

impl MockImages {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            images: HashMap::new(),
        }
    }

    pub(crate) fn with_image(mut self, image: Arc<dyn Image>) -> Self {
        self.images.insert(image.reference().to_string(), image);
        self
    }
}

fn backing(use_daemon: bool) -> &'static str {
    if use_daemon {
        "daemon"
    } else {
        "registry"
    }
}

#[async_trait]
impl ImageAccess for MockImages {
    async fn read_image(&self, reference: &str, use_daemon: bool) -> Result<Arc<dyn Image>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("read {} {}", reference, backing(use_daemon)));
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| RebaseError::ImageNotFound {
                reference: reference.to_string(),
                message: "no such image".to_string(),
            })
    }

    async fn repo_store(
        &self,
        reference: &str,
        use_daemon: bool,
    ) -> Result<Arc<dyn WritableStore>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("store {} {}", reference, backing(use_daemon)));
        Ok(Arc::new(MockStore::new(reference)))
    }
}

/// Store that keeps written images in memory.
pub(crate) struct MockStore {
    reference: String,
    written: Mutex<Vec<RebasedImage>>,
}

impl MockStore {
    pub(crate) fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            written: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn written(&self) -> Vec<RebasedImage> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl WritableStore for MockStore {
    fn reference(&self) -> &str {
        &self.reference
    }

    async fn write(&self, image: &RebasedImage) -> Result<String> {
        self.written.lock().unwrap().push(image.clone());
        Ok(Digest::sha256(&image.config).to_string())
    }
}
