//! Configuration management.
//!
//! Loads configuration from environment variables using dotenvy.
//! All settings are loaded at startup and stored in a thread-safe Arc.

mod error;
mod settings;

pub use error::{CaptchaError, Result};
pub use settings::{CollisionPolicy, Config, DEFAULT_FONT_SOURCE_URL, LogFormat};
