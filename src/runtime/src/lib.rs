//! Stackport Runtime - image rebasing.
//!
//! This crate provides the rebase core together with the image access
//! adapters it runs against: the local OCI image store and remote
//! registries.

#![allow(clippy::result_large_err)]

pub mod access;
pub mod oci;
pub mod rebase;

// Re-export common types
pub use access::{Image, ImageAccess, ImageDaemon, Layer, LocalDaemon, OciImages, WritableStore};
pub use oci::{ImageReference, ImageStore, RegistryAuth, RegistryPuller, RegistryPusher};
pub use rebase::{compose, rebase, RebaseConfig, RebaseFactory, RebaseFlags, RebasedImage};

/// Stackport Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum local image store size: 10 GB.
pub const DEFAULT_IMAGE_STORE_SIZE: u64 = 10 * 1024 * 1024 * 1024;
