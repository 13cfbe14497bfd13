//! Command implementations

pub mod build;
pub mod cache;
pub mod images;
pub mod init;

use std::path::Path;

use kiln_core::{Mode, Pipeline, PipelineConfig};
use miette::{IntoDiagnostic, Result};
use tracing::info;

use crate::cli::Cli;

/// Loads the configuration named on the command line, or the one in the
/// current directory, applying `--production`.
pub fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = if let Some(ref path) = cli.config {
        PipelineConfig::from_file(path).into_diagnostic()?
    } else {
        find_config()?
    };

    if cli.production {
        config.mode = Mode::Production;
    }

    Ok(config)
}

pub fn open_pipeline(cli: &Cli) -> Result<Pipeline> {
    Pipeline::new(load_config(cli)?).into_diagnostic()
}

fn find_config() -> Result<PipelineConfig> {
    if let Some(path) = PipelineConfig::discover(Path::new(".")) {
        info!("Using config: {}", path.display());
        return PipelineConfig::from_file(&path).into_diagnostic();
    }

    info!("No config file found, using defaults");
    Ok(PipelineConfig::new())
}
