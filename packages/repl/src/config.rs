//! Shell errors and interpreter configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use tether::InterpreterConfig;
use thiserror::Error;

use crate::io::IoError;

#[derive(Debug, Error)]
pub enum ReplError {
    #[error(transparent)]
    Interpreter(#[from] tether::Error),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error("couldn't read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read an [`InterpreterConfig`] from a JSON file. Missing fields take their
/// defaults; the result is validated.
pub fn load_config(path: &Path) -> Result<InterpreterConfig, ReplError> {
    let text = read_file(path)?;
    let config: InterpreterConfig =
        serde_json::from_slice(&text).map_err(|source| ReplError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, ReplError> {
    fs::read(path).map_err(|source| ReplError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}
