//! Base image selection from configured stacks.

use std::sync::Arc;

use stackport_core::error::{RebaseError, Result};
use stackport_core::Config;

use crate::oci::ImageReference;

/// Picks the new base image for a repository from the configured stacks.
#[derive(Debug, Clone)]
pub struct StackResolver {
    config: Arc<Config>,
}

impl StackResolver {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Resolve the base image reference for `repo_name`.
    ///
    /// An empty `stack_id` selects the configured default stack. Within the
    /// stack, the build image hosted on the same registry as `repo_name`
    /// wins; otherwise the first build image is used.
    pub fn resolve(&self, stack_id: &str, repo_name: &str) -> Result<String> {
        let stack_id = if stack_id.is_empty() {
            self.config.default_stack_id.as_str()
        } else {
            stack_id
        };

        let stack = self
            .config
            .stack(stack_id)
            .ok_or_else(|| RebaseError::StackNotFound {
                stack_id: stack_id.to_string(),
            })?;

        let first = stack
            .build_images
            .first()
            .ok_or_else(|| RebaseError::InvalidStack {
                stack_id: stack.id.clone(),
                message: "requires at least one build image".to_string(),
            })?;

        let selected = ImageReference::host_of(repo_name)
            .and_then(|host| {
                stack
                    .build_images
                    .iter()
                    .find(|image| ImageReference::host_of(image).as_deref() == Some(host.as_str()))
            })
            .unwrap_or(first);

        tracing::debug!(
            stack = %stack.id,
            repo = repo_name,
            image = %selected,
            "Resolved base image"
        );
        Ok(selected.clone())
    }
}
