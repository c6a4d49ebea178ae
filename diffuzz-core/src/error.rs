//! Error types for the fuzzing pipeline

use thiserror::Error;

/// Core error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Engine error: {engine} - {message}")]
    Engine { engine: String, message: String },

    #[error("Worker join error: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Join(err.to_string())
    }
}

impl Error {
    /// Create a configuration error with a formatted message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an engine error for a named engine
    pub fn engine<S1: Into<String>, S2: Into<String>>(engine: S1, message: S2) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }
}

/// Result type used throughout the core library
pub type Result<T> = std::result::Result<T, Error>;
