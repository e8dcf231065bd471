//! Rebase orchestration.
//!
//! `RebaseFactory` turns command-line flags into a [`RebaseConfig`]: the new
//! base image from the stack, the application image, its old base layers and
//! the store the result is written to.

use std::sync::Arc;

use stackport_core::error::Result;
use stackport_core::Config;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use super::boundary::{base_layer_boundary, BaseLayerView};
use super::lifecycle::{LifecycleMetadata, LifecycleMetadataResolver};
use super::stack::StackResolver;
use crate::access::{Image, ImageAccess, ImageDaemon, WritableStore};

/// A rebase request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaseFlags {
    /// Repository of the application image.
    pub repo_name: String,
    /// Read from and write to the registry instead of the local store.
    pub publish: bool,
    /// Skip refreshing local images before reading them.
    pub no_pull: bool,
    /// Stack to rebase onto; empty selects the default stack.
    pub stack_id: String,
}

/// Everything needed to compose and write a rebased image.
pub struct RebaseConfig {
    pub repo_name: String,
    pub publish: bool,
    pub repo: Arc<dyn WritableStore>,
    pub repo_image: Arc<dyn Image>,
    /// `repo_image` restricted to the layers it inherited from its base.
    pub old_base: Arc<dyn Image>,
    pub new_base: Arc<dyn Image>,
}

impl std::fmt::Debug for RebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebaseConfig")
            .field("repo_name", &self.repo_name)
            .field("publish", &self.publish)
            .field("repo", &self.repo.reference())
            .field("repo_image", &self.repo_image.reference())
            .field("new_base", &self.new_base.reference())
            .finish()
    }
}

/// Builds rebase configurations from flags.
pub struct RebaseFactory {
    daemon: Arc<dyn ImageDaemon>,
    images: Arc<dyn ImageAccess>,
    stacks: StackResolver,
    metadata: LifecycleMetadataResolver,
    log: Dispatch,
}

impl RebaseFactory {
    /// Create a factory. Events are emitted through `log` rather than the
    /// global subscriber.
    pub fn new(
        daemon: Arc<dyn ImageDaemon>,
        images: Arc<dyn ImageAccess>,
        config: Arc<Config>,
        log: Dispatch,
    ) -> Self {
        Self {
            metadata: LifecycleMetadataResolver::new(daemon.clone()),
            stacks: StackResolver::new(config),
            daemon,
            images,
            log,
        }
    }

    /// Resolve every image involved in rebasing `flags.repo_name`.
    ///
    /// Any failure aborts the whole build; no partial result is returned.
    pub async fn rebase_config_from_flags(&self, flags: &RebaseFlags) -> Result<RebaseConfig> {
        self.build(flags).with_subscriber(self.log.clone()).await
    }

    async fn build(&self, flags: &RebaseFlags) -> Result<RebaseConfig> {
        let base_ref = self.stacks.resolve(&flags.stack_id, &flags.repo_name)?;
        tracing::info!(
            repo = %flags.repo_name,
            base = %base_ref,
            publish = flags.publish,
            "Rebasing"
        );

        let new_base = self.read(&base_ref, flags).await?;
        let repo_image = self.read(&flags.repo_name, flags).await?;
        let repo = self
            .images
            .repo_store(&flags.repo_name, !flags.publish)
            .await?;

        // Provenance comes from the backing the layers were read from.
        let metadata = if flags.publish {
            LifecycleMetadata::from_labels(repo_image.reference(), repo_image.labels())?
        } else {
            self.metadata.resolve(repo_image.reference()).await?
        };
        let layers = repo_image.layers()?;
        let boundary =
            base_layer_boundary(repo_image.reference(), &layers, metadata.run_image_hex())?;
        tracing::debug!(
            repo = %flags.repo_name,
            base_layers = boundary + 1,
            app_layers = layers.len() - boundary - 1,
            "Found base layer boundary"
        );

        let old_base = BaseLayerView::new(repo_image.clone(), &layers, boundary)?;

        Ok(RebaseConfig {
            repo_name: flags.repo_name.clone(),
            publish: flags.publish,
            repo,
            repo_image,
            old_base: Arc::new(old_base),
            new_base,
        })
    }

    /// Pull `reference` when reading from the daemon, then read it.
    async fn read(&self, reference: &str, flags: &RebaseFlags) -> Result<Arc<dyn Image>> {
        let use_daemon = !flags.publish;
        if use_daemon && !flags.no_pull {
            tracing::debug!(reference, "Pulling image");
            self.daemon.pull_image(reference).await?;
        }
        self.images.read_image(reference, use_daemon).await
    }
}
