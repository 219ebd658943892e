//! Error types and result aliases.
//!
//! Defines the core `CaptchaError` enumeration and common `Result` type.

use std::path::PathBuf;
use thiserror::Error;

/// Captcha pipeline errors.
#[derive(Debug, Error)]
pub enum CaptchaError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error on a specific path.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote font listing or download failed.
    #[error("http error: {0}")]
    Http(String),

    /// Font file exists but cannot be parsed.
    #[error("invalid font {}: {reason}", path.display())]
    InvalidFont { path: PathBuf, reason: String },

    /// Font selection gave up after the configured number of attempts.
    #[error("no fonts available after {attempts} attempts")]
    NoFontsAvailable { attempts: u32 },

    /// PNG encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Output file already exists and the collision policy forbids replacing it.
    #[error("output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// A pool worker terminated abnormally.
    #[error("worker error: {0}")]
    Worker(String),
}

impl CaptchaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for `CaptchaError`.
pub type Result<T> = std::result::Result<T, CaptchaError>;
