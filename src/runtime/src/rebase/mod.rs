//! Rebasing application images onto new base images.
//!
//! ```text
//! flags ─▶ StackResolver ─▶ new base reference
//!       ─▶ ImageDaemon / ImageAccess ─▶ new base, application image, store
//!       ─▶ LifecycleMetadataResolver ─▶ recorded run image digest
//!       ─▶ base_layer_boundary ─▶ old base view
//!       ─▶ compose ─▶ WritableStore::write
//! ```

mod boundary;
mod compose;
mod factory;
mod lifecycle;
mod stack;

pub use boundary::{base_layer_boundary, BaseLayerView};
pub use compose::{compose, rebase, RebasedImage};
pub use factory::{RebaseConfig, RebaseFactory, RebaseFlags};
pub use lifecycle::{
    LifecycleMetadata, LifecycleMetadataResolver, RunImageMetadata, LIFECYCLE_METADATA_LABEL,
};
pub use stack::StackResolver;
