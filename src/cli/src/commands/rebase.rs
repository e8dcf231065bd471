//! `stackport rebase` command.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use stackport_runtime::{
    LocalDaemon, OciImages, RebaseFactory, RebaseFlags, RegistryAuth, RegistryPuller,
    RegistryPusher,
};

#[derive(Args)]
pub struct RebaseArgs {
    /// Repository of the application image (e.g., "registry.example.com/app")
    pub repo: String,

    /// Read from and write to the registry instead of the local image store
    #[arg(long)]
    pub publish: bool,

    /// Use local images as they are, without pulling them first
    #[arg(long)]
    pub no_pull: bool,

    /// Stack to rebase onto (defaults to the configured default stack)
    #[arg(short, long)]
    pub stack: Option<String>,
}

pub async fn execute(
    args: RebaseArgs,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(super::load_config(config_path)?);
    let store = Arc::new(super::open_image_store()?);

    // Registry credentials come from the environment (falls back to anonymous)
    let registry = Arc::new(RegistryPuller::with_auth(RegistryAuth::from_env()));
    let pusher = Arc::new(RegistryPusher::with_auth(RegistryAuth::from_env()));

    let daemon = Arc::new(LocalDaemon::new(store.clone(), registry.clone()));
    let images = Arc::new(OciImages::new(store, registry, pusher));
    let log = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
    let factory = RebaseFactory::new(daemon, images, config, log);

    let flags = RebaseFlags {
        repo_name: args.repo.clone(),
        publish: args.publish,
        no_pull: args.no_pull,
        stack_id: args.stack.unwrap_or_default(),
    };

    println!("Rebasing {}...", args.repo);
    let rebase_config = factory.rebase_config_from_flags(&flags).await?;
    let digest = stackport_runtime::rebase(&rebase_config).await?;

    if args.publish {
        println!("Pushed: {} ({})", rebase_config.repo.reference(), digest);
    } else {
        println!("Rebased: {} ({})", rebase_config.repo.reference(), digest);
    }

    Ok(())
}
