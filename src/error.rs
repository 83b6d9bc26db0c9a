//! Error handling for the Sample Exchange client

use std::fmt;
use thiserror::Error;

use crate::auth::AuthError;
use crate::upload::UploadError;
use crate::window::WindowDiagnostic;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the Sample Exchange client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Local file errors (token file, upload source files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Session lifecycle errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Malformed access window input
    #[error("Window error: {0}")]
    Window(#[from] WindowDiagnostic),

    /// Upload or submission rejected before it reached the API
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// HTTP status carried by the error, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the server rejected the request's credentials
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
