//! CAPTCHA generation.
//!
//! Implements text generation, image composition, persistence, and the run driver.

pub mod generator;
pub mod manager;
pub mod output;
pub mod text;

pub use generator::{CaptchaGenerator, GeneratorSettings, contrast_color, encode_png};
pub use manager::{CaptchaManager, GeneratedCaptcha};
pub use output::OutputDir;
pub use text::{ALPHABET, CaptchaText};
