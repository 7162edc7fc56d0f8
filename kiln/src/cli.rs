use clap::{Parser, Subcommand};
use kiln_core::Loader;

/// Installs and launches Minecraft versions, vanilla or modded.
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new installation (nothing is downloaded yet)
    Create {
        name: String,
        /// Game version, like 1.20.1
        version: String,
        /// vanilla, fabric, quilt, forge or neoforge
        #[arg(short, long, default_value = "vanilla")]
        loader: Loader,
        /// Loader version (latest if not given)
        #[arg(long)]
        loader_version: Option<String>,
    },
    /// Download everything an installation needs
    Install { name: String },
    /// Install (if needed) and start an installation
    Launch {
        name: String,
        /// Offline player name (defaults to the one in config.json)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Delete an installation and its files
    Delete { name: String },
    /// List installations
    #[command(alias = "ls")]
    List,
    /// List available game versions
    Versions {
        /// Include snapshots and old alphas/betas
        #[arg(long)]
        all: bool,
    },
    /// Manage Java runtimes
    #[command(subcommand)]
    Java(JavaCommands),
}

#[derive(Subcommand)]
pub enum JavaCommands {
    /// List runtimes found on this system and installed by kiln
    List,
    /// Install a runtime of the given major version
    Install { major: u32 },
}
