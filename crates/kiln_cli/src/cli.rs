//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Kiln - Incremental asset builds
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Build in production mode regardless of the configuration
    #[arg(long, global = true)]
    pub production: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build assets
    Build {
        /// Source files to build (default: every configured source)
        paths: Vec<PathBuf>,

        /// Rebuild even if artifacts are up to date
        #[arg(long)]
        force: bool,
    },

    /// Inspect the image registry
    Images {
        #[command(subcommand)]
        command: ImagesCommands,
    },

    /// Manage the build cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ImagesCommands {
    /// List registered images
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the path registered for an image name
    Resolve {
        /// Logical image name (e.g. "icons/close.svg")
        name: String,
    },

    /// Rescan every image directory
    Rebuild,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Load the durable cache into the in-memory cache
    Preload,

    /// Remove every cache entry
    Clear,
}
