//! Captcha text generation.

use rand::Rng;
use std::fmt;

/// Symbols a captcha text is drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default number of characters per captcha.
pub const DEFAULT_LENGTH: usize = 6;

/// Random uppercase alphanumeric text rendered into a captcha.
///
/// Doubles as the output file stem, so it only ever holds [`ALPHABET`] symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptchaText(String);

impl CaptchaText {
    /// Draws `len` characters independently and uniformly from [`ALPHABET`].
    #[must_use]
    pub fn random<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Self {
        let text = (0..len)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `<text>.png`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl fmt::Display for CaptchaText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
