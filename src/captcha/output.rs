//! Captcha persistence.
//!
//! Writes rendered captchas as `<text>.png` into an output directory.

use crate::captcha::generator::encode_png;
use crate::captcha::text::CaptchaText;
use crate::config::{CaptchaError, CollisionPolicy, Result};
use image::RgbImage;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory receiving generated captcha images.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    collision: CollisionPolicy,
}

impl OutputDir {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, collision: CollisionPolicy) -> Self {
        Self {
            root: root.into(),
            collision,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves `img` as `<text>.png`, creating the directory when absent.
    ///
    /// Returns the path written, which differs from `<text>.png` only under
    /// [`CollisionPolicy::Suffix`].
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Io` on filesystem failure, `CaptchaError::Encode`
    /// if PNG encoding fails, and `CaptchaError::OutputExists` when the name is
    /// taken under [`CollisionPolicy::Error`].
    pub fn save(&self, img: &RgbImage, text: &CaptchaText) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| CaptchaError::io(&self.root, e))?;
        let png = encode_png(img)?;

        let path = match self.collision {
            CollisionPolicy::Overwrite => {
                let path = self.root.join(text.file_name());
                fs::write(&path, &png).map_err(|e| CaptchaError::io(&path, e))?;
                path
            }
            CollisionPolicy::Error => {
                let path = self.root.join(text.file_name());
                write_new(&path, &png)?.ok_or(CaptchaError::OutputExists(path))?
            }
            CollisionPolicy::Suffix => self.write_suffixed(text, &png)?,
        };

        debug!(path = %path.display(), bytes = png.len(), "Captcha saved");
        Ok(path)
    }

    fn write_suffixed(&self, text: &CaptchaText, png: &[u8]) -> Result<PathBuf> {
        let first = self.root.join(text.file_name());
        if let Some(path) = write_new(&first, png)? {
            return Ok(path);
        }

        for n in 1_u32.. {
            let candidate = self.root.join(format!("{text}-{n}.png"));
            if let Some(path) = write_new(&candidate, png)? {
                return Ok(path);
            }
        }
        Err(CaptchaError::OutputExists(first))
    }
}

/// Creates `path` exclusively. `Ok(None)` means it already existed.
fn write_new(path: &Path, bytes: &[u8]) -> Result<Option<PathBuf>> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(CaptchaError::io(path, e)),
    };
    file.write_all(bytes).map_err(|e| CaptchaError::io(path, e))?;
    Ok(Some(path.to_path_buf()))
}
