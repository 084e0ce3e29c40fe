//! Error types for the Javelin library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`JavelinError`] enum. Variants map to the main failure domains of the
//! pipeline: the change queue, the primary store, the search engine, and
//! configuration handling.

use std::io;

use thiserror::Error;

/// The main error type for Javelin operations.
#[derive(Error, Debug)]
pub enum JavelinError {
    /// I/O errors (queue log access, index directories, config files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Change-queue errors (corrupt log frames, unknown record ids).
    #[error("Queue error: {0}")]
    Queue(String),

    /// Search-engine errors (bulk call failures, index admin failures).
    #[error("Engine error: {0}")]
    Engine(String),

    /// Primary-store errors (record loading, key paging).
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors (invalid batch sizes, bad index names).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Binary encoding/decoding errors in the queue log.
    #[error("Encoding error: {0}")]
    Encode(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with JavelinError.
pub type Result<T> = std::result::Result<T, JavelinError>;

impl JavelinError {
    /// Create a new queue error.
    pub fn queue<S: Into<String>>(msg: S) -> Self {
        JavelinError::Queue(msg.into())
    }

    /// Create a new engine error.
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        JavelinError::Engine(msg.into())
    }

    /// Create a new store error.
    pub fn store<S: Into<String>>(msg: S) -> Self {
        JavelinError::Store(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        JavelinError::Config(msg.into())
    }

    /// Create a new encoding error.
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        JavelinError::Encode(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        JavelinError::Other(msg.into())
    }
}

impl From<bincode::Error> for JavelinError {
    fn from(err: bincode::Error) -> Self {
        JavelinError::Encode(err.to_string())
    }
}
