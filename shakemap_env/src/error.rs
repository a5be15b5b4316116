//! Error types for the ShakeMap environment layer.

use thiserror::Error;

/// Errors raised while building or validating sites and ruptures.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Coordinates outside the valid geographic range
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
    
    /// Rupture descriptor is unusable (non-finite magnitude, etc.)
    #[error("Invalid rupture: {0}")]
    InvalidRupture(String),
    
    /// Unknown truncation or standard-deviation type name
    #[error("Unknown parameter value: {0}")]
    UnknownValue(String),
}

impl EnvError {
    /// Creates an invalid-location error.
    pub fn location(msg: impl Into<String>) -> Self {
        Self::InvalidLocation(msg.into())
    }
    
    /// Creates an invalid-rupture error.
    pub fn rupture(msg: impl Into<String>) -> Self {
        Self::InvalidRupture(msg.into())
    }
}
