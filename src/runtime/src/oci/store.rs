//! Local image store.
//!
//! Plays the role of the daemon for non-published rebases: images live on
//! disk as OCI layouts under `sha256/<manifest digest>/`, indexed by full
//! reference in a persistent `index.json`. Re-putting a reference replaces
//! its entry; layouts no longer referenced by any entry are removed. When the
//! store grows past its limit the least recently used images are evicted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackport_core::error::{RebaseError, Result};
use tokio::sync::RwLock;

use super::digest::bare_hex;

/// Index entry for a stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    /// Full image reference (e.g., "docker.io/packs/run:latest")
    pub reference: String,
    /// Manifest digest (e.g., "sha256:abc123...")
    pub digest: String,
    pub size_bytes: u64,
    /// When the entry was last written
    pub stored_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// OCI layout directory
    pub path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    images: Vec<StoredImage>,
}

/// Disk-backed image store with an in-memory index.
pub struct ImageStore {
    store_dir: PathBuf,
    /// reference → StoredImage
    index: Arc<RwLock<HashMap<String, StoredImage>>>,
    max_size_bytes: u64,
}

impl ImageStore {
    /// Open (or create) a store rooted at `store_dir`.
    pub fn new(store_dir: &Path, max_size_bytes: u64) -> Result<Self> {
        std::fs::create_dir_all(store_dir).map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to create image store directory {}: {}",
                store_dir.display(),
                e
            ))
        })?;

        let index = Self::load_index(store_dir)?;
        Ok(Self {
            store_dir: store_dir.to_path_buf(),
            index: Arc::new(RwLock::new(index)),
            max_size_bytes,
        })
    }

    /// Look up an image by reference, marking it used.
    pub async fn get(&self, reference: &str) -> Option<StoredImage> {
        let mut index = self.index.write().await;
        let image = index.get_mut(reference)?;
        image.last_used = Utc::now();
        let updated = image.clone();
        drop(index);
        // last_used is advisory
        if let Err(e) = self.save_index().await {
            tracing::warn!(error = %e, "Failed to persist image store index");
        }
        Some(updated)
    }

    /// Store the layout in `source_dir` under `reference`.
    ///
    /// The layout is copied to `sha256/<digest>/` unless that directory
    /// already exists. A previous entry for `reference` is replaced.
    pub async fn put(
        &self,
        reference: &str,
        digest: &str,
        source_dir: &Path,
    ) -> Result<StoredImage> {
        let target_dir = self.store_dir.join("sha256").join(bare_hex(digest));

        if !target_dir.exists() {
            copy_dir_recursive(source_dir, &target_dir).map_err(|e| {
                RebaseError::OciImageError(format!("Failed to copy image to store: {}", e))
            })?;
        }

        let now = Utc::now();
        let stored = StoredImage {
            reference: reference.to_string(),
            digest: digest.to_string(),
            size_bytes: dir_size(&target_dir),
            stored_at: now,
            last_used: now,
            path: target_dir,
        };

        let mut index = self.index.write().await;
        let replaced = index.insert(reference.to_string(), stored.clone());
        let orphaned = replaced.filter(|old| {
            old.digest != stored.digest && !index.values().any(|img| img.digest == old.digest)
        });
        drop(index);

        if let Some(old) = orphaned {
            tracing::debug!(
                reference,
                old_digest = %old.digest,
                new_digest = %stored.digest,
                "Replaced stored image"
            );
            remove_layout(&old.path)?;
        }

        self.save_index().await?;
        Ok(stored)
    }

    /// Remove an image by reference.
    pub async fn remove(&self, reference: &str) -> Result<()> {
        let mut index = self.index.write().await;
        let image = index.remove(reference).ok_or_else(|| {
            RebaseError::OciImageError(format!("Image not found: {}", reference))
        })?;
        let digest_still_used = index.values().any(|img| img.digest == image.digest);
        drop(index);

        if !digest_still_used {
            remove_layout(&image.path)?;
        }

        self.save_index().await
    }

    /// Evict least-recently-used images until total size is under the limit.
    ///
    /// Returns the references of evicted images.
    pub async fn evict(&self) -> Result<Vec<String>> {
        let mut evicted = Vec::new();

        while self.total_size().await > self.max_size_bytes {
            let lru_ref = {
                let index = self.index.read().await;
                index
                    .values()
                    .min_by_key(|img| img.last_used)
                    .map(|img| img.reference.clone())
            };

            match lru_ref {
                Some(reference) => {
                    self.remove(&reference).await?;
                    evicted.push(reference);
                }
                None => break,
            }
        }

        Ok(evicted)
    }

    /// Total size of all stored images in bytes.
    pub async fn total_size(&self) -> u64 {
        let index = self.index.read().await;
        index.values().map(|img| img.size_bytes).sum()
    }

    /// Get the store directory path.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Read the persisted index, keeping entries whose layouts still exist.
    fn load_index(store_dir: &Path) -> Result<HashMap<String, StoredImage>> {
        let index_path = store_dir.join("index.json");
        if !index_path.exists() {
            return Ok(HashMap::new());
        }

        let data = std::fs::read_to_string(&index_path).map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to read image store index {}: {}",
                index_path.display(),
                e
            ))
        })?;

        let store_index: StoreIndex = serde_json::from_str(&data).map_err(|e| {
            RebaseError::OciImageError(format!("Failed to parse image store index: {}", e))
        })?;

        Ok(store_index
            .images
            .into_iter()
            .filter(|image| image.path.exists())
            .map(|image| (image.reference.clone(), image))
            .collect())
    }

    async fn save_index(&self) -> Result<()> {
        let index = self.index.read().await;
        let store_index = StoreIndex {
            images: index.values().cloned().collect(),
        };
        drop(index);

        let data = serde_json::to_string_pretty(&store_index)?;
        let index_path = self.store_dir.join("index.json");

        tokio::fs::write(&index_path, data).await.map_err(|e| {
            RebaseError::OciImageError(format!(
                "Failed to write image store index {}: {}",
                index_path.display(),
                e
            ))
        })
    }
}

fn remove_layout(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(path).map_err(|e| {
        RebaseError::OciImageError(format!(
            "Failed to remove image directory {}: {}",
            path.display(),
            e
        ))
    })
}

/// Recursively copy a directory.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Calculate total size of a directory recursively.
fn dir_size(path: &Path) -> u64 {
    let mut total = 0;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                total += dir_size(&path);
            } else if let Ok(meta) = path.metadata() {
                total += meta.len();
            }
        }
    }
    total
}
