//! Font asset storage and selection.
//!
//! `FontStore` is the capability the composer draws fonts from. The
//! directory-backed implementation provisions itself from a remote listing
//! when empty and evicts files that fail to parse.

use crate::config::{CaptchaError, Result};
use crate::fonts::remote::{RemoteFontSource, is_font_file};
use ab_glyph::{Font, FontArc, FontVec, PxScale};
use rand::Rng;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Identifies a font asset by its file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(String);

impl FontId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed font ready to render glyphs at a fixed size.
#[derive(Clone)]
pub struct FontAsset {
    pub id: FontId,
    pub font: FontArc,
    pub scale: PxScale,
}

impl FontAsset {
    /// Parses `bytes` and sizes the font to `size` pixels per em.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::InvalidFont` if the bytes are not a usable font.
    pub fn from_bytes(id: FontId, bytes: Vec<u8>, size: f32) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| CaptchaError::InvalidFont {
            path: PathBuf::from(id.as_str()),
            reason: e.to_string(),
        })?;
        let units_per_em = font.units_per_em().unwrap_or(1000.0);
        let scale = PxScale::from(size * font.height_unscaled() / units_per_em);
        Ok(Self {
            id,
            font: FontArc::new(font),
            scale,
        })
    }
}

impl fmt::Debug for FontAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontAsset")
            .field("id", &self.id)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Source of fonts for the composer.
pub trait FontStore: Send + Sync {
    /// Makes sure at least one font is present, provisioning if possible.
    /// Returns the number of fonts available afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures; unreachable remotes yield `Ok(0)`.
    fn ensure(&self) -> Result<usize>;

    /// Lists the fonts currently held, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be enumerated.
    fn list(&self) -> Result<Vec<FontId>>;

    /// Loads one font at `size` pixels per em.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::InvalidFont` for unparseable data and
    /// `CaptchaError::Io` when the asset cannot be read.
    fn load(&self, id: &FontId, size: f32) -> Result<FontAsset>;

    /// Removes a font from the store. Removing a missing font is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset exists but cannot be removed.
    fn evict(&self, id: &FontId) -> Result<()>;

    /// Picks a uniformly random loadable font.
    ///
    /// Lists the store, provisions it when empty, then loads a random entry.
    /// Unparseable fonts are evicted and selection continues with the rest.
    /// Only empty provisioning rounds and fonts vanishing before load count
    /// towards `max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::NoFontsAvailable` after `max_attempts` misses
    /// without a loadable font, or any local storage error.
    fn pick_random<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: f32,
        max_attempts: u32,
    ) -> Result<FontAsset>
    where
        Self: Sized,
    {
        let mut misses = 0;
        while misses < max_attempts {
            let mut fonts = self.list()?;
            if fonts.is_empty() {
                misses += 1;
                debug!(attempt = misses, "No local fonts, provisioning");
                self.ensure()?;
                fonts = self.list()?;
                if fonts.is_empty() {
                    continue;
                }
            }

            let id = &fonts[rng.random_range(0..fonts.len())];
            match self.load(id, size) {
                Ok(asset) => return Ok(asset),
                Err(CaptchaError::InvalidFont { reason, .. }) => {
                    warn!(font = %id, reason = %reason, "Failed to load font, evicting");
                    self.evict(id)?;
                }
                Err(CaptchaError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    misses += 1;
                    debug!(font = %id, attempt = misses, "Font vanished before load");
                }
                Err(e) => return Err(e),
            }
        }

        Err(CaptchaError::NoFontsAvailable {
            attempts: max_attempts,
        })
    }
}

/// Font store backed by `.ttf` files in one directory.
pub struct DirFontStore {
    dir: PathBuf,
    remote: Option<(RemoteFontSource, Runtime)>,
    provision_lock: Mutex<()>,
}

impl DirFontStore {
    /// Creates an offline store over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote: None,
            provision_lock: Mutex::new(()),
        }
    }

    /// Attaches a remote source used when the directory holds no fonts.
    ///
    /// Must not be called from within a Tokio runtime; the store drives its
    /// own single-threaded runtime for downloads.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Http` if the download runtime cannot be created.
    pub fn with_remote(mut self, source: RemoteFontSource) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CaptchaError::Http(format!("download runtime: {e}")))?;
        self.remote = Some((source, runtime));
        Ok(self)
    }

    fn path_of(&self, id: &FontId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    fn provision(&self, source: &RemoteFontSource, runtime: &Runtime) -> Result<usize> {
        let entries = match runtime.block_on(source.list()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url = %source.listing_url(), error = %e, "Failed to fetch font list");
                return Ok(0);
            }
        };

        fs::create_dir_all(&self.dir).map_err(|e| CaptchaError::io(&self.dir, e))?;

        let mut downloaded = 0;
        for entry in entries {
            let file_name = Path::new(&entry.name).file_name().and_then(|n| n.to_str());
            if file_name != Some(entry.name.as_str()) {
                warn!(name = %entry.name, "Skipping font with unsafe name");
                continue;
            }

            let dest = self.dir.join(&entry.name);
            if dest.exists() {
                continue;
            }

            info!(font = %entry.name, "Font not found locally, downloading");
            match runtime.block_on(source.download(&entry)) {
                Ok(bytes) => {
                    write_atomic(&dest, &bytes)?;
                    downloaded += 1;
                    info!(font = %entry.name, bytes = bytes.len(), "Downloaded font");
                }
                Err(e) => warn!(font = %entry.name, error = %e, "Failed to download font"),
            }
        }
        Ok(downloaded)
    }
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = dest.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| CaptchaError::io(&tmp, e))?;
    fs::rename(&tmp, dest).map_err(|e| CaptchaError::io(dest, e))
}

impl FontStore for DirFontStore {
    fn ensure(&self) -> Result<usize> {
        let _guard = self
            .provision_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let existing = self.list()?.len();
        if existing > 0 {
            return Ok(existing);
        }

        let Some((source, runtime)) = &self.remote else {
            debug!(dir = %self.dir.display(), "No fonts and no remote source configured");
            return Ok(0);
        };

        self.provision(source, runtime)?;
        Ok(self.list()?.len())
    }

    fn list(&self) -> Result<Vec<FontId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CaptchaError::io(&self.dir, e)),
        };

        let mut fonts: Vec<FontId> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_font_file(name))
            .map(FontId)
            .collect();
        fonts.sort();
        Ok(fonts)
    }

    fn load(&self, id: &FontId, size: f32) -> Result<FontAsset> {
        let path = self.path_of(id);
        let bytes = fs::read(&path).map_err(|e| CaptchaError::io(&path, e))?;
        FontAsset::from_bytes(id.clone(), bytes, size).map_err(|e| match e {
            CaptchaError::InvalidFont { reason, .. } => CaptchaError::InvalidFont { path, reason },
            other => other,
        })
    }

    fn evict(&self, id: &FontId) -> Result<()> {
        let _guard = self
            .provision_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let path = self.path_of(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(font = %id, "Evicted font");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CaptchaError::io(path, e)),
        }
    }
}
