use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use vfs0097_rs::DriverConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Load a YAML driver config, missing keys keep their defaults.
pub fn load_config(path: &Path) -> Result<DriverConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
