//! Error types for drivers and structure adapters

use thiserror::Error;

/// Output pipeline errors
#[derive(Error, Debug)]
pub enum OutputError {
    /// Serial port failure
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// Socket or port I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, OutputError>;

impl From<OutputError> for glimmer_core::CoreError {
    fn from(err: OutputError) -> Self {
        glimmer_core::CoreError::Device(err.to_string())
    }
}
