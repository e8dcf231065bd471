//! Stackport Core - Foundational Types
//!
//! This module provides the error and configuration types shared by the
//! stackport runtime and CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, Stack};
pub use error::{RebaseError, Result};

/// Stackport version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
