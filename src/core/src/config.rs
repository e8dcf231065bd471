//! Stack configuration.
//!
//! Loaded from a TOML file (default `~/.stackport/config.toml`):
//!
//! ```toml
//! default-stack-id = "io.buildpacks.stacks.bionic"
//!
//! [[stacks]]
//! id = "io.buildpacks.stacks.bionic"
//! build-images = ["packs/build", "registry.example.com/packs/build"]
//! run-images = ["packs/run"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{RebaseError, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "STACKPORT_CONFIG";

/// A named pairing of build and run base images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Stack {
    pub id: String,

    #[serde(default)]
    pub build_images: Vec<String>,

    #[serde(default)]
    pub run_images: Vec<String>,
}

/// Stackport configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Stack used when no stack is requested explicitly.
    /// Not checked against `stacks` until it is resolved.
    #[serde(default)]
    pub default_stack_id: String,

    #[serde(default)]
    pub stacks: Vec<Stack>,
}

impl Config {
    /// Load the configuration from `path`.
    ///
    /// A missing file yields an empty configuration. Duplicate stack ids
    /// are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using empty config");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RebaseError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_toml(&content)?;
        tracing::debug!(
            path = %path.display(),
            stacks = config.stacks.len(),
            default_stack = %config.default_stack_id,
            "Loaded config"
        );
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config path from `STACKPORT_CONFIG`, falling back to `~/.stackport/config.toml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        home_dir().join("config.toml")
    }

    /// Look up a stack by id.
    pub fn stack(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for stack in &self.stacks {
            if !seen.insert(stack.id.as_str()) {
                return Err(RebaseError::ConfigError(format!(
                    "stack id '{}' is configured more than once",
                    stack.id
                )));
            }
        }
        Ok(())
    }
}

/// Return the stackport home directory (~/.stackport).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".stackport"))
        .unwrap_or_else(|| PathBuf::from(".stackport"))
}
