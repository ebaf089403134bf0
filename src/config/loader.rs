// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialise a config file without semantic validation.
///
/// Relative `[statistics].logs` entries are resolved against the directory
/// holding the config file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawConfigFile = toml::from_str(&contents)?;

    let base = config_dir(path);
    for log in config.statistics.logs.iter_mut() {
        if log.is_relative() {
            *log = base.join(&*log);
        }
    }

    Ok(config)
}

/// Read, deserialise and validate a config file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `wfsched.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("wfsched.toml")
}

fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
