//! Composition of the rebased image and the final write.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use stackport_core::error::{RebaseError, Result};

use super::factory::RebaseConfig;
use super::lifecycle::{LifecycleMetadata, LIFECYCLE_METADATA_LABEL};
use crate::access::{Image, Layer};
use crate::oci::LayoutLayer;

/// An application image placed on a new base, ready to be written.
#[derive(Clone)]
pub struct RebasedImage {
    pub reference: String,
    /// New base layers followed by the application layers.
    pub layers: Vec<Arc<dyn Layer>>,
    /// Image configuration JSON.
    pub config: Vec<u8>,
}

impl RebasedImage {
    /// Read every layer blob, in order.
    pub(crate) async fn layout_layers(&self) -> Result<Vec<LayoutLayer>> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            layers.push(LayoutLayer {
                media_type: layer.descriptor().media_type.clone(),
                data: layer.read_blob().await?,
            });
        }
        Ok(layers)
    }
}

/// Swap the old base layers of `config.repo_image` for `config.new_base`.
///
/// The image configuration keeps everything except `rootfs`, which lists the
/// composed diff ids, and `history`, which is emptied since its entries no
/// longer line up with the layers. The lifecycle label is rewritten to record
/// the new base's top layer.
pub fn compose(config: &RebaseConfig) -> Result<RebasedImage> {
    let new_base = config.new_base.layers()?;
    let top = new_base.last().ok_or_else(|| {
        RebaseError::OciImageError(format!(
            "new base {} has no layers",
            config.new_base.reference()
        ))
    })?;
    let top_diff_id = top.diff_id()?.to_string();

    let base_count = config.old_base.layers()?.len();
    let repo_layers = config.repo_image.layers()?;
    let app_layers = repo_layers.get(base_count..).unwrap_or_default();

    let layers: Vec<Arc<dyn Layer>> = new_base.iter().chain(app_layers).cloned().collect();
    let diff_ids = layers
        .iter()
        .map(|layer| layer.diff_id().map(|d| d.to_string()))
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = LifecycleMetadata::from_labels(
        config.repo_image.reference(),
        config.repo_image.labels(),
    )?;
    metadata.run_image.sha = top_diff_id;

    let mut document: Value = serde_json::from_slice(config.repo_image.raw_config())?;
    let root = document.as_object_mut().ok_or_else(|| {
        RebaseError::OciImageError("image config is not a JSON object".to_string())
    })?;
    root.insert(
        "rootfs".to_string(),
        json!({ "type": "layers", "diff_ids": diff_ids }),
    );
    root.insert("history".to_string(), json!([]));
    object_entry(object_entry(root, "config")?, "Labels")?.insert(
        LIFECYCLE_METADATA_LABEL.to_string(),
        Value::String(metadata.to_label()?),
    );

    tracing::debug!(
        repo = %config.repo_name,
        new_base_layers = new_base.len(),
        app_layers = app_layers.len(),
        run_image = %metadata.run_image.sha,
        "Composed rebased image"
    );

    Ok(RebasedImage {
        reference: config.repo.reference().to_string(),
        layers,
        config: serde_json::to_vec(&document)?,
    })
}

/// Compose the rebased image and write it to the repository store.
/// Returns the written manifest digest.
pub async fn rebase(config: &RebaseConfig) -> Result<String> {
    let image = compose(config)?;
    let digest = config.repo.write(&image).await?;
    tracing::info!(reference = %image.reference, digest = %digest, "Rebased image written");
    Ok(digest)
}

/// Object under `key`, created when missing or null.
fn object_entry<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>> {
    let entry = map.entry(key).or_insert(Value::Null);
    if entry.is_null() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut().ok_or_else(|| {
        RebaseError::OciImageError(format!("image config field '{}' is not an object", key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::mock::{same_layer, MockImage, MockLayer, MockStore};
    use crate::oci::parse_config;
    use crate::rebase::BaseLayerView;

    const REPO: &str = "some/repo";

    struct Fixture {
        store: Arc<MockStore>,
        repo_layers: Vec<Arc<dyn Layer>>,
        base_layers: Vec<Arc<dyn Layer>>,
        config: RebaseConfig,
    }

    fn fixture(base_layers: Vec<Arc<dyn Layer>>, image_config: Value) -> Fixture {
        let repo_layers = vec![
            MockLayer::new("12345", "l1"),
            MockLayer::new("abcdef", "l2"),
            MockLayer::new("ffffff", "l3"),
        ];
        let repo_image = MockImage::new(REPO)
            .with_layers(repo_layers.clone())
            .with_label(
                LIFECYCLE_METADATA_LABEL,
                r#"{"app":{"sha":"sha256:app"},"runimage":{"sha":"sha256:abcdef"}}"#,
            )
            .with_config(image_config)
            .build();
        let new_base = MockImage::new("packs/build")
            .with_layers(base_layers.clone())
            .build();
        let store = Arc::new(MockStore::new("docker.io/some/repo:latest"));
        let old_base = BaseLayerView::new(repo_image.clone(), &repo_layers, 1).unwrap();

        Fixture {
            config: RebaseConfig {
                repo_name: REPO.to_string(),
                publish: false,
                repo: store.clone(),
                repo_image,
                old_base: Arc::new(old_base),
                new_base,
            },
            store,
            repo_layers,
            base_layers,
        }
    }

    fn image_config() -> Value {
        json!({
            "architecture": "amd64",
            "os": "linux",
            "config": {
                "Env": ["PATH=/usr/bin"],
                "Labels": {
                    "maintainer": "ops",
                    "io.buildpacks.lifecycle.metadata":
                        "{\"runimage\":{\"sha\":\"sha256:abcdef\"}}"
                }
            },
            "rootfs": {
                "type": "layers",
                "diff_ids": ["sha256:12345", "sha256:abcdef", "sha256:ffffff"]
            },
            "history": [
                { "created_by": "base" },
                { "created_by": "base" },
                { "created_by": "app" }
            ]
        })
    }

    fn new_base_layers() -> Vec<Arc<dyn Layer>> {
        vec![MockLayer::new("777777", "n1"), MockLayer::new("888888", "n2")]
    }

    #[test]
    fn test_new_base_goes_under_app_layers() {
        let fx = fixture(new_base_layers(), image_config());
        let image = compose(&fx.config).unwrap();

        assert_eq!(image.reference, "docker.io/some/repo:latest");
        assert_eq!(image.layers.len(), 3);
        assert!(same_layer(&image.layers[0], &fx.base_layers[0]));
        assert!(same_layer(&image.layers[1], &fx.base_layers[1]));
        assert!(same_layer(&image.layers[2], &fx.repo_layers[2]));
    }

    #[test]
    fn test_config_is_rewritten() {
        let fx = fixture(new_base_layers(), image_config());
        let image = compose(&fx.config).unwrap();
        let config: Value = serde_json::from_slice(&image.config).unwrap();

        assert_eq!(
            config["rootfs"]["diff_ids"],
            json!(["sha256:777777", "sha256:888888", "sha256:ffffff"])
        );
        assert_eq!(config["history"], json!([]));
        assert_eq!(config["config"]["Env"], json!(["PATH=/usr/bin"]));
        assert_eq!(config["config"]["Labels"]["maintainer"], "ops");

        let label = config["config"]["Labels"][LIFECYCLE_METADATA_LABEL].as_str().unwrap();
        let metadata: Value = serde_json::from_str(label).unwrap();
        assert_eq!(metadata["runimage"]["sha"], "sha256:888888");
        assert_eq!(metadata["app"]["sha"], "sha256:app");
    }

    #[test]
    fn test_missing_labels_object_is_created() {
        let fx = fixture(new_base_layers(), json!({ "config": { "Labels": null } }));
        let image = compose(&fx.config).unwrap();
        let config: Value = serde_json::from_slice(&image.config).unwrap();
        assert!(config["config"]["Labels"][LIFECYCLE_METADATA_LABEL].is_string());
    }

    #[test]
    fn test_composed_config_is_readable() {
        let fx = fixture(new_base_layers(), image_config());
        let image = compose(&fx.config).unwrap();

        let (labels, diff_ids) = parse_config(&image.config).unwrap();
        assert_eq!(diff_ids, ["sha256:777777", "sha256:888888", "sha256:ffffff"]);
        assert_eq!(labels["maintainer"], "ops");
        let metadata = LifecycleMetadata::from_labels(REPO, &labels).unwrap();
        assert_eq!(metadata.run_image_hex(), "888888");
    }

    #[test]
    fn test_empty_new_base_is_rejected() {
        let fx = fixture(vec![], image_config());
        let err = compose(&fx.config).err().unwrap();
        assert!(matches!(err, RebaseError::OciImageError(_)));
    }

    #[tokio::test]
    async fn test_rebase_writes_to_repo_store() {
        let fx = fixture(new_base_layers(), image_config());
        let digest = rebase(&fx.config).await.unwrap();

        let written = fx.store.written();
        assert_eq!(written.len(), 1);
        assert!(digest.starts_with("sha256:"));

        let layout = written[0].layout_layers().await.unwrap();
        let blobs: Vec<&[u8]> = layout.iter().map(|l| l.data.as_slice()).collect();
        assert_eq!(blobs, [b"n1".as_slice(), b"n2".as_slice(), b"l3".as_slice()]);
        assert_eq!(fx.config.old_base.layers().unwrap().len(), 2);
        assert_eq!(fx.config.repo_image.layers().unwrap().len(), 3);
    }
}
