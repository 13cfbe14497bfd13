//! Init command implementation

use std::io::Write;
use std::path::PathBuf;

use kiln_core::PipelineConfig;
use miette::{IntoDiagnostic, Result};
use tracing::info;

const DEFAULT_CONFIG: &str = r#"{
  "mode": "development",
  "stylesheets": {
    "source_dirs": ["assets/scss"],
    "build_dir": "public/build/css"
  },
  "scripts": {
    "source_dirs": ["assets/js"],
    "build_dir": "public/build/js"
  },
  "images": {
    "dirs": ["public/images"],
    "public_root": "public"
  },
  "cache": {
    "dir": ".kiln-cache"
  },
  "variables": {}
}
"#;

pub fn run_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(PipelineConfig::CONFIG_FILES[0]);

    loop {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);

        match options.open(&config_path) {
            Ok(mut file) => {
                file.write_all(DEFAULT_CONFIG.as_bytes()).into_diagnostic()?;
                info!("Created {}", config_path.display());
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if !force {
                    return Err(miette::miette!(
                        "Config file already exists. Use --force to overwrite."
                    ));
                }

                match std::fs::remove_file(&config_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_diagnostic(),
                }
            }
            Err(e) => return Err(e).into_diagnostic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::from_json(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.images.public_root.as_deref(), Some("public"));
    }
}
