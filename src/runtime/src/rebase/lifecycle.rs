//! Build provenance recorded on application images.
//!
//! The lifecycle writes a JSON document under [`LIFECYCLE_METADATA_LABEL`]
//! naming the top layer of the run image the application was built on:
//!
//! ```json
//! {"runimage": {"sha": "sha256:<hex>"}, "app": {...}, "buildpacks": [...]}
//! ```
//!
//! Only `runimage.sha` is interpreted. Every other field is carried through
//! untouched so the label can be rewritten after a rebase.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stackport_core::error::{RebaseError, Result};

use crate::access::ImageDaemon;
use crate::oci::bare_hex;

/// Label holding the lifecycle metadata document.
pub const LIFECYCLE_METADATA_LABEL: &str = "io.buildpacks.lifecycle.metadata";

/// Parsed lifecycle metadata label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleMetadata {
    #[serde(rename = "runimage")]
    pub run_image: RunImageMetadata,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunImageMetadata {
    /// Diff id of the run image's top layer, `sha256:` prefix optional.
    #[serde(default)]
    pub sha: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LifecycleMetadata {
    /// Parse the metadata label from an image's labels.
    pub fn from_labels(reference: &str, labels: &HashMap<String, String>) -> Result<Self> {
        let raw = labels
            .get(LIFECYCLE_METADATA_LABEL)
            .ok_or_else(|| RebaseError::MetadataMissing {
                reference: reference.to_string(),
            })?;

        let metadata: Self =
            serde_json::from_str(raw).map_err(|e| RebaseError::MetadataMalformed {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        if metadata.run_image_hex().is_empty() {
            return Err(RebaseError::MetadataMalformed {
                reference: reference.to_string(),
                message: "runimage.sha is empty".to_string(),
            });
        }

        Ok(metadata)
    }

    /// The recorded run image digest without its algorithm prefix.
    pub fn run_image_hex(&self) -> &str {
        bare_hex(&self.run_image.sha)
    }

    /// Serialize back to a label value.
    pub fn to_label(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reads lifecycle metadata through the daemon's inspect capability.
pub struct LifecycleMetadataResolver {
    daemon: Arc<dyn ImageDaemon>,
}

impl LifecycleMetadataResolver {
    pub fn new(daemon: Arc<dyn ImageDaemon>) -> Self {
        Self { daemon }
    }

    pub async fn resolve(&self, reference: &str) -> Result<LifecycleMetadata> {
        let inspect = self.daemon.inspect_image_config(reference).await?;
        let metadata = LifecycleMetadata::from_labels(reference, &inspect.labels)?;

        tracing::debug!(reference, run_image = %metadata.run_image.sha, "Read lifecycle metadata");
        Ok(metadata)
    }
}
