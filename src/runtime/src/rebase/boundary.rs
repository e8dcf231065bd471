//! Split point between inherited base layers and application layers.

use std::collections::HashMap;
use std::sync::Arc;

use stackport_core::error::{RebaseError, Result};

use crate::access::{Image, Layer};

/// Index of the top base layer in `layers`.
///
/// Layers are scanned from the root upward and the first layer whose diff id
/// hex equals `target_hex` (ignoring case) is the boundary. Layers
/// `[0..=boundary]` belong to the base. When nothing matches the image cannot
/// be traced to a base and `BaseLayerNotFound` is returned.
pub fn base_layer_boundary(
    reference: &str,
    layers: &[Arc<dyn Layer>],
    target_hex: &str,
) -> Result<usize> {
    for (index, layer) in layers.iter().enumerate() {
        if layer.diff_id()?.matches_hex(target_hex) {
            return Ok(index);
        }
    }

    Err(RebaseError::BaseLayerNotFound {
        reference: reference.to_string(),
        digest: target_hex.to_string(),
    })
}

/// Read-only view of an application image restricted to its base layers.
///
/// Everything except `layers` is answered by the underlying image.
pub struct BaseLayerView {
    inner: Arc<dyn Image>,
    layers: Vec<Arc<dyn Layer>>,
}

impl BaseLayerView {
    /// View over `layers[0..=boundary]` of `inner`.
    pub fn new(inner: Arc<dyn Image>, layers: &[Arc<dyn Layer>], boundary: usize) -> Result<Self> {
        let prefix = layers.get(..=boundary).ok_or_else(|| {
            RebaseError::OciImageError(format!(
                "boundary {} is outside the {} layers of {}",
                boundary,
                layers.len(),
                inner.reference()
            ))
        })?;

        Ok(Self {
            layers: prefix.to_vec(),
            inner,
        })
    }
}

impl Image for BaseLayerView {
    fn reference(&self) -> &str {
        self.inner.reference()
    }

    fn labels(&self) -> &HashMap<String, String> {
        self.inner.labels()
    }

    fn raw_config(&self) -> &[u8] {
        self.inner.raw_config()
    }

    fn layers(&self) -> Result<Vec<Arc<dyn Layer>>> {
        Ok(self.layers.clone())
    }
}
