//! CLI command definitions and dispatch.

mod rebase;
mod version;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stackport_core::Config;

/// Stackport: rebase application images onto new base images.
#[derive(Parser)]
#[command(name = "stackport", version, about)]
pub struct Cli {
    /// Config file (defaults to $STACKPORT_CONFIG or ~/.stackport/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Rebase an application image onto the base image of a stack
    Rebase(rebase::RebaseArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Return the path to the image store directory (~/.stackport/images).
pub(crate) fn images_dir() -> PathBuf {
    stackport_core::config::home_dir().join("images")
}

/// Open the shared image store.
pub(crate) fn open_image_store(
) -> Result<stackport_runtime::ImageStore, Box<dyn std::error::Error>> {
    let dir = images_dir();
    let store =
        stackport_runtime::ImageStore::new(&dir, stackport_runtime::DEFAULT_IMAGE_STORE_SIZE)?;
    Ok(store)
}

/// Load the config from `path`, or from the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
    Ok(Config::load(&path)?)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Rebase(args) => rebase::execute(args, cli.config.as_deref()).await,
        Command::Version(args) => version::execute(args).await,
    }
}
