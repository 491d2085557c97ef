//! Error taxonomy shared by the loader, the output setup, and the driver.

use thiserror::Error;

/// Fatal conditions that abort a listening session.
///
/// Every variant is terminal: `main` prints the message and exits with status 1.
/// Non-fatal conditions such as tracks of differing length are logged instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid flag value, too many or no input files, unreadable config.
    #[error("{0}")]
    Configuration(String),

    /// Undecodable input, zero channels/rate, cross-track mismatch, excessive length.
    #[error("{path}: {reason}")]
    Format { path: String, reason: String },

    /// Audio device lookup, stream build, or stream start failure.
    #[error("{0}")]
    Resource(String),

    /// Terminal mode switching or key polling failure.
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

impl AppError {
    pub fn format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for fallible session setup.
pub type AppResult<T> = Result<T, AppError>;
