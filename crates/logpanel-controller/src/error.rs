//! Error types for controller setup

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Logs(#[from] logpanel_logs::Error),

    #[error(transparent)]
    State(#[from] logpanel_state::StateError),
}

pub type Result<T> = std::result::Result<T, Error>;
