//! OCI image plumbing.
//!
//! Everything the image access adapters need to read, store and move
//! images:
//!
//! - reference and digest parsing
//! - OCI image layout reading and writing
//! - the local image store (LRU-evicted)
//! - registry pull and push
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    OCI Image Layout                          │
//! │                                                              │
//! │  image/                                                      │
//! │  ├── oci-layout           (OCI layout marker)               │
//! │  ├── index.json           (Image index)                     │
//! │  └── blobs/                                                 │
//! │      └── sha256/                                            │
//! │          ├── <manifest>   (Image manifest)                  │
//! │          ├── <config>     (Image configuration)             │
//! │          └── <layers>     (Filesystem layers)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod digest;
mod image;
mod layout;
mod pull;
pub mod reference;
pub mod registry;
pub mod store;

pub use digest::{bare_hex, Digest};
pub use image::{parse_config, LayerDescriptor, OciImage};
pub use layout::{write_layout, LayoutLayer};
pub use pull::ImagePuller;
pub use reference::ImageReference;
pub use registry::{PushResult, RegistryAuth, RegistryPuller, RegistryPusher, RemoteManifest};
pub use store::{ImageStore, StoredImage};
