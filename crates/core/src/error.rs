//! Error types for ShellGuard.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ShellGuard's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ShellGuard.
///
/// Only startup and configuration problems surface through this type.
/// Faults that happen while a command runs are folded into the command's
/// exit code and stderr instead.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid dangerous pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // =========================================================================
    // Sandbox Startup Errors
    // =========================================================================
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Sandbox image '{image}' is missing and no Dockerfile was found at {}", .path.display())]
    ImageMissing { image: String, path: PathBuf },

    #[error("Failed to build sandbox image: {0}")]
    ImageBuild(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Invalid working directory: {0}")]
    InvalidDirectory(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a runtime-unavailable error.
    pub fn runtime_unavailable(msg: impl Into<String>) -> Self {
        Self::RuntimeUnavailable(msg.into())
    }

    /// Create an image build error.
    pub fn image_build(msg: impl Into<String>) -> Self {
        Self::ImageBuild(msg.into())
    }

    /// Create a sandbox error.
    pub fn sandbox(msg: impl Into<String>) -> Self {
        Self::Sandbox(msg.into())
    }

    /// Create an invalid directory error.
    pub fn invalid_directory(msg: impl Into<String>) -> Self {
        Self::InvalidDirectory(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
