//! Error types for catalog handling and orchestration.

use shakemap_core::ShakeMapError;
use shakemap_env::EnvError;
use thiserror::Error;

/// Errors raised by the simulation layer.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),
    
    /// Catalog or config JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    /// Field computation failure
    #[error(transparent)]
    ShakeMap(#[from] ShakeMapError),
    
    /// Invalid site or rupture
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
