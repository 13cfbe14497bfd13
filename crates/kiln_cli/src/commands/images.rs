//! Images command implementation

use miette::{IntoDiagnostic, Result};
use tracing::{error, info};

use super::open_pipeline;
use crate::cli::Cli;

pub fn run_images_list(cli: &Cli, json: bool) -> Result<()> {
    let pipeline = open_pipeline(cli)?;
    let entries = pipeline.images().entries();

    if json {
        let output = serde_json::to_string_pretty(&entries).into_diagnostic()?;
        println!("{}", output);
    } else {
        for (name, path) in &entries {
            println!("{} -> {}", name, path);
        }
        info!("{} images registered", entries.len());
    }

    Ok(())
}

/// Prints the path for `name`. Returns `true` if the name is unknown.
pub fn run_images_resolve(cli: &Cli, name: &str) -> Result<bool> {
    let pipeline = open_pipeline(cli)?;

    match pipeline.images().resolve(name) {
        Ok(path) => {
            println!("{}", path);
            Ok(false)
        }
        Err(e) => {
            error!("{}", e);
            Ok(true)
        }
    }
}

pub fn run_images_rebuild(cli: &Cli) -> Result<()> {
    let pipeline = open_pipeline(cli)?;
    let count = pipeline.images().rebuild().into_diagnostic()?;

    println!("Rebuilt image registry: {} images", count);
    Ok(())
}
