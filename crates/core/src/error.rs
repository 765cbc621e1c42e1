//! Error types for the restyle-core library.
//!
//! Every failure that can end a generation attempt maps to one of these
//! variants. The controller shows `to_string()` of the error in its error
//! view, so the `Display` text of user-facing variants is written for users.

use thiserror::Error;

/// Errors that can occur within the restyle-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// The user's input is incomplete or unsupported (no image, empty prompt,
    /// unknown file type). Corrected by the user, never retried.
    #[error("{0}")]
    Validation(String),

    /// Configuration-related errors (missing API key, invalid base URL).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The selected image could not be turned into a request payload, or the
    /// returned image data could not be decoded.
    #[error("Image encoding failed: {0}")]
    Encoding(String),

    /// The backend was reached but no image came back, or the call failed.
    /// Carries only the user-facing message.
    #[error("{0}")]
    Generation(String),

    /// Raw backend or transport diagnostic. Logged, then translated into
    /// [`AppError::Generation`] before it reaches the user.
    #[error("Gemini API error: {0}")]
    Backend(String),

    /// UI-related errors (window creation, event loop).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an encoding error with the given message.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Creates a user-facing generation error with the given message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Creates a backend diagnostic error with the given message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
