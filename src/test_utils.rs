//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit and integration tests,
//! reducing duplication across the codebase.

#[cfg(any(test, feature = "testing"))]
use crate::config::{CollisionPolicy, Config};
#[cfg(any(test, feature = "testing"))]
use std::path::Path;
#[cfg(any(test, feature = "testing"))]
use std::sync::Arc;

/// DejaVu Sans Bold, a known-good TrueType font.
#[cfg(any(test, feature = "testing"))]
pub const FIXTURE_FONT: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// DejaVu Sans Mono Bold, a second known-good TrueType font.
#[cfg(any(test, feature = "testing"))]
pub const FIXTURE_FONT_MONO: &[u8] = include_bytes!("../assets/DejaVuSansMono-Bold.ttf");

/// Writes both fixture fonts into `dir`, creating it if needed.
///
/// # Panics
///
/// Panics if the directory or files cannot be written.
#[cfg(any(test, feature = "testing"))]
pub fn seed_font_dir(dir: &Path) {
    std::fs::create_dir_all(dir).expect("create font dir");
    std::fs::write(dir.join("DejaVuSans-Bold.ttf"), FIXTURE_FONT).expect("write fixture font");
    std::fs::write(dir.join("DejaVuSansMono-Bold.ttf"), FIXTURE_FONT_MONO)
        .expect("write fixture font");
}

/// Creates a configuration rooted at `root` for testing purposes.
///
/// This configuration has:
/// - Fonts in `root/fonts`, output in `root/pics`
/// - No remote font source
/// - Three captchas of six characters on a 200x100 canvas
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_test_config(root: &Path) -> Arc<Config> {
    Arc::new(Config {
        count: 3,
        text_length: 6,
        width: 200,
        height: 100,
        font_dir: root.join("fonts"),
        font_size: 55.0,
        font_source_url: None,
        font_max_attempts: 4,
        http_timeout_secs: 5,
        output_dir: root.join("pics"),
        collision: CollisionPolicy::Overwrite,
        workers: 1,
        seed: None,
    })
}
