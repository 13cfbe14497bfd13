//! Kiln CLI
//!
//! Incremental asset builds for SCSS, scripts and images.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{CacheCommands, Cli, Commands, ImagesCommands};
use commands::build::run_build;
use commands::cache::{run_cache_clear, run_cache_preload};
use commands::images::{run_images_list, run_images_rebuild, run_images_resolve};
use commands::init::run_init;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match &cli.command {
        Commands::Build { paths, force } => run_build(&cli, paths, *force),
        Commands::Images { command } => match command {
            ImagesCommands::List { json } => run_images_list(&cli, *json).map(|_| false),
            ImagesCommands::Resolve { name } => run_images_resolve(&cli, name),
            ImagesCommands::Rebuild => run_images_rebuild(&cli).map(|_| false),
        },
        Commands::Cache { command } => match command {
            CacheCommands::Preload => run_cache_preload(&cli).map(|_| false),
            CacheCommands::Clear => run_cache_clear(&cli).map(|_| false),
        },
        Commands::Init { force } => run_init(*force).map(|_| false),
    }
}
