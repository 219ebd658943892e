//! Configuration settings.
//!
//! Defines the main `Config` struct and environment variable loading logic.

use super::error::{CaptchaError, Result};
use crate::captcha::GeneratorSettings;
use crate::captcha::text::DEFAULT_LENGTH;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Google Fonts repository listing of Apache-licensed families.
pub const DEFAULT_FONT_SOURCE_URL: &str =
    "https://api.github.com/repos/google/fonts/contents/apache";

/// What the persister does when `<text>.png` already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Fail the run with `CaptchaError::OutputExists`.
    Error,
    /// Write `<text>-<n>.png` with the first free `n`.
    Suffix,
}

impl CollisionPolicy {
    fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ERROR" => Self::Error,
            "SUFFIX" => Self::Suffix,
            _ => Self::Overwrite,
        }
    }
}

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`, defaulting to pretty output.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_str(&get_env_or("LOG_FORMAT", "pretty"))
    }

    fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "JSON" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_u64_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn get_env_u32_or(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn get_env_usize_or(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn get_env_f32_or(key: &str, default: f32) -> f32 {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of captchas generated per run.
    pub count: usize,
    /// Characters per captcha text.
    pub text_length: usize,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Directory holding `.ttf` font assets.
    pub font_dir: PathBuf,
    /// Glyph size in pixels per em.
    pub font_size: f32,
    /// Remote directory listing used to provision fonts. `None` disables downloads.
    pub font_source_url: Option<String>,
    /// Upper bound on font selection attempts before giving up.
    pub font_max_attempts: u32,
    /// Timeout for each remote request, in seconds.
    pub http_timeout_secs: u64,
    /// Directory receiving the generated PNG files.
    pub output_dir: PathBuf,
    /// Behaviour when an output file name is already taken.
    pub collision: CollisionPolicy,
    /// Size of the generation worker pool.
    pub workers: usize,
    /// Fixed seed making a run reproducible; random when unset.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            count: 10,
            text_length: DEFAULT_LENGTH,
            width: 200,
            height: 100,
            font_dir: PathBuf::from("."),
            font_size: 55.0,
            font_source_url: Some(DEFAULT_FONT_SOURCE_URL.to_string()),
            font_max_attempts: 8,
            http_timeout_secs: 30,
            output_dir: PathBuf::from("pics"),
            collision: CollisionPolicy::Overwrite,
            workers: 1,
            seed: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to the defaults of
    /// [`Config::default`]. Setting `FONT_SOURCE_URL` to `none` disables
    /// remote provisioning.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Config` if the resulting settings fail [`Config::validate`].
    pub fn from_env() -> Result<Arc<Self>> {
        let defaults = Self::default();

        let font_source_url = match env::var("FONT_SOURCE_URL") {
            Ok(v) if v.eq_ignore_ascii_case("none") => None,
            Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            _ => defaults.font_source_url,
        };

        let config = Self {
            count: get_env_usize_or("CAPTCHA_COUNT", defaults.count),
            text_length: get_env_usize_or("CAPTCHA_LENGTH", defaults.text_length),
            width: get_env_u32_or("CAPTCHA_WIDTH", defaults.width),
            height: get_env_u32_or("CAPTCHA_HEIGHT", defaults.height),
            font_dir: PathBuf::from(get_env_or("FONT_DIR", ".")),
            font_size: get_env_f32_or("FONT_SIZE", defaults.font_size),
            font_source_url,
            font_max_attempts: get_env_u32_or("FONT_MAX_ATTEMPTS", defaults.font_max_attempts),
            http_timeout_secs: get_env_u64_or("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            output_dir: PathBuf::from(get_env_or("OUTPUT_DIR", "pics")),
            collision: CollisionPolicy::from_str(&get_env_or("OUTPUT_COLLISION", "overwrite")),
            workers: get_env_usize_or("WORKERS", defaults.workers),
            seed: env::var("CAPTCHA_SEED")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
        };

        config.validate()?;
        Ok(Arc::new(config))
    }

    /// Checks that every setting is usable by the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Config` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.text_length == 0 {
            return Err(CaptchaError::Config("CAPTCHA_LENGTH must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(CaptchaError::Config("WORKERS must be at least 1".into()));
        }
        GeneratorSettings::from(self).validate()
    }
}
