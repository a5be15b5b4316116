//! Error types for the shake-map core.

use shakemap_env::EnvError;
use thiserror::Error;

/// Errors raised by field computation and grid handling.
#[derive(Debug, Error)]
pub enum ShakeMapError {
    /// Caller supplied unusable input (empty site list, bad rupture, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    
    /// Covariance matrix could not be Cholesky-factored
    #[error("Covariance matrix for {num_sites} sites at T={period}s is not positive definite (duplicate or degenerate sites?)")]
    NotPositiveDefinite { num_sites: usize, period: f64 },
    
    /// Ground-motion model returned NaN/inf where a value was required
    #[error("Invalid model output: {0}")]
    InvalidModelOutput(String),
    
    /// Column index beyond the pre-sized grid
    #[error("Column {index} out of range (grid has {len} columns)")]
    ColumnOutOfRange { index: usize, len: usize },
    
    /// Column written more than once
    #[error("Column {0} was already filled")]
    ColumnAlreadyFilled(usize),
    
    /// Column with the wrong number of site values
    #[error("Column has {got} values, grid has {expected} sites")]
    SiteCountMismatch { expected: usize, got: usize },
    
    /// Malformed EQRM text
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    
    /// Site or rupture descriptor rejected by the environment layer
    #[error(transparent)]
    Env(#[from] EnvError),
    
    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShakeMapError {
    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
    
    /// Creates an invalid-model-output error.
    pub fn model_output(msg: impl Into<String>) -> Self {
        Self::InvalidModelOutput(msg.into())
    }
    
    /// Creates a parse error.
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Self::Parse { line, message: msg.into() }
    }
}

/// Result alias for shake-map operations.
pub type Result<T> = std::result::Result<T, ShakeMapError>;
