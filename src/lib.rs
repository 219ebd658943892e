//! Library definitions.
//!
//! Exports captcha generation, font provisioning, and configuration types.

pub mod captcha;
pub mod config;
pub mod fonts;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
pub use captcha::{
    CaptchaGenerator, CaptchaManager, CaptchaText, GeneratedCaptcha, GeneratorSettings, OutputDir,
    contrast_color,
};
pub use config::{CaptchaError, CollisionPolicy, Config, LogFormat, Result};
pub use fonts::{DirFontStore, FontAsset, FontId, FontStore, RemoteFontSource};
