//! Captcha image composition.
//!
//! Renders each character as a coverage tile with a random font and rotation,
//! blends the tiles in with vertical jitter, then overlays line and dot noise.
//! All ink uses the complement of a random background colour.

use crate::captcha::text::CaptchaText;
use crate::config::{CaptchaError, Config, Result};
use crate::fonts::{FontAsset, FontStore};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::rect::Rect;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::debug;

const TILE_SIZE: u32 = 50;
const CHAR_X_ORIGIN: i32 = 20;
const CHAR_X_STEP: i32 = 30;
const CHAR_Y_RANGE: RangeInclusive<i32> = 10..=40;
const MAX_ROTATION_DEG: i32 = 30;
const LINE_COUNT: usize = 5;
const DOT_COUNT: usize = 100;
const DOT_DIAMETER: RangeInclusive<u32> = 1..=5;

type Segment = ((f32, f32), (f32, f32));

/// Per-channel 8-bit complement of `color`. Applying it twice is the identity.
#[must_use]
pub const fn contrast_color(color: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = color.0;
    Rgb([255 - r, 255 - g, 255 - b])
}

/// Canvas and font parameters for the composer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorSettings {
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
    pub font_max_attempts: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GeneratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            width: config.width,
            height: config.height,
            font_size: config.font_size,
            font_max_attempts: config.font_max_attempts,
        }
    }
}

impl GeneratorSettings {
    /// Checks that the canvas and font parameters can be rendered.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Config` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptchaError::Config(format!(
                "canvas size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(CaptchaError::Config(format!(
                "FONT_SIZE must be positive, got {}",
                self.font_size
            )));
        }
        if self.font_max_attempts == 0 {
            return Err(CaptchaError::Config("FONT_MAX_ATTEMPTS must be at least 1".into()));
        }
        Ok(())
    }
}

/// Composes captcha images from fonts held by a [`FontStore`].
pub struct CaptchaGenerator<S> {
    store: Arc<S>,
    settings: GeneratorSettings,
}

impl<S: FontStore> CaptchaGenerator<S> {
    #[must_use]
    pub const fn new(store: Arc<S>, settings: GeneratorSettings) -> Self {
        Self { store, settings }
    }

    /// Renders `text` onto a fresh canvas.
    ///
    /// Output is a pure function of the store contents and `rng`, so a seeded
    /// rng reproduces the image pixel for pixel.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Config` for unusable settings and propagates
    /// font selection failures, including `NoFontsAvailable`.
    pub fn compose<R: Rng + ?Sized>(&self, text: &CaptchaText, rng: &mut R) -> Result<RgbImage> {
        self.settings.validate()?;
        let background = Rgb([rng.random(), rng.random(), rng.random()]);
        self.compose_on(text, rng, background)
    }

    pub(crate) fn compose_on<R: Rng + ?Sized>(
        &self,
        text: &CaptchaText,
        rng: &mut R,
        background: Rgb<u8>,
    ) -> Result<RgbImage> {
        let ink = contrast_color(background);
        let mut img = RgbImage::from_pixel(self.settings.width, self.settings.height, background);

        self.draw_glyphs(&mut img, text.as_str(), rng, ink)?;
        draw_lines(&mut img, rng, ink);
        draw_dots(&mut img, rng, ink);
        Ok(img)
    }

    /// Blends one rotated glyph tile per character, the i-th with its
    /// top-left corner at `x = 20 + 30i` and a random `y` in `[10, 40]`.
    fn draw_glyphs<R: Rng + ?Sized>(
        &self,
        img: &mut RgbImage,
        text: &str,
        rng: &mut R,
        ink: Rgb<u8>,
    ) -> Result<()> {
        for (i, ch) in text.chars().enumerate() {
            let font = self.store.pick_random(
                rng,
                self.settings.font_size,
                self.settings.font_max_attempts,
            )?;
            let rotation = rng.random_range(-MAX_ROTATION_DEG..=MAX_ROTATION_DEG);
            let tile = render_tile(ch, &font, rotation);

            let index = i32::try_from(i).unwrap_or(i32::MAX);
            let x = CHAR_X_ORIGIN.saturating_add(CHAR_X_STEP.saturating_mul(index));
            let y = rng.random_range(CHAR_Y_RANGE);
            debug!(%ch, font = %font.id, rotation, x, y, "Placing character");
            blend_tile(img, &tile, x, y, ink);
        }
        Ok(())
    }
}

/// Glyph coverage of `ch` on a transparent tile, 255 meaning fully inked.
fn render_tile(ch: char, font: &FontAsset, rotation_deg: i32) -> GrayImage {
    let mut tile = GrayImage::new(TILE_SIZE, TILE_SIZE);
    draw_text_mut(
        &mut tile,
        Luma([255]),
        0,
        0,
        font.scale,
        &font.font,
        &ch.to_string(),
    );
    rotate_expanded(&tile, rotation_deg)
}

fn random_segment<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> Segment {
    let x1 = px(rng.random_range(0..width));
    let y1 = px(rng.random_range(0..height));
    let x2 = px(rng.random_range(0..width));
    let y2 = px(rng.random_range(0..height));
    ((x1, y1), (x2, y2))
}

fn draw_lines<R: Rng + ?Sized>(img: &mut RgbImage, rng: &mut R, ink: Rgb<u8>) {
    let (width, height) = img.dimensions();
    for _ in 0..LINE_COUNT {
        draw_thick_line(img, random_segment(rng, width, height), ink);
    }
}

/// Draws a segment with stroke width 2: a second pass shifted by one pixel
/// across the dominant axis.
fn draw_thick_line(img: &mut RgbImage, ((x1, y1), (x2, y2)): Segment, ink: Rgb<u8>) {
    let (ox, oy) = if (x2 - x1).abs() >= (y2 - y1).abs() {
        (0.0, 1.0)
    } else {
        (1.0, 0.0)
    };
    draw_line_segment_mut(img, (x1, y1), (x2, y2), ink);
    draw_line_segment_mut(img, (x1 + ox, y1 + oy), (x2 + ox, y2 + oy), ink);
}

/// Top-left corner and diameter of one noise dot.
fn random_dot<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> (i32, i32, u32) {
    let x = i32::try_from(rng.random_range(0..width)).unwrap_or(i32::MAX);
    let y = i32::try_from(rng.random_range(0..height)).unwrap_or(i32::MAX);
    (x, y, rng.random_range(DOT_DIAMETER))
}

fn draw_dots<R: Rng + ?Sized>(img: &mut RgbImage, rng: &mut R, ink: Rgb<u8>) {
    let (width, height) = img.dimensions();
    for _ in 0..DOT_COUNT {
        let (x, y, diameter) = random_dot(rng, width, height);
        draw_dot(img, x, y, diameter, ink);
    }
}

/// Fills a disc inscribed in the `diameter`×`diameter` box whose top-left
/// corner is (`x`, `y`). Clips at the canvas edges.
fn draw_dot(img: &mut RgbImage, x: i32, y: i32, diameter: u32, ink: Rgb<u8>) {
    if diameter == 0 {
        return;
    }
    if diameter <= 2 {
        draw_filled_rect_mut(img, Rect::at(x, y).of_size(diameter, diameter), ink);
        return;
    }

    let (width, height) = img.dimensions();
    let d = i64::from(diameter);
    for dy in 0..d {
        for dx in 0..d {
            // Pixel centre inside the circle, in doubled coordinates.
            let (cx, cy) = (2 * dx + 1 - d, 2 * dy + 1 - d);
            if cx * cx + cy * cy > d * d {
                continue;
            }
            if let (Ok(gx), Ok(gy)) = (
                u32::try_from(i64::from(x) + dx),
                u32::try_from(i64::from(y) + dy),
            ) && gx < width
                && gy < height
            {
                img.put_pixel(gx, gy, ink);
            }
        }
    }
}

/// Encodes `img` as PNG bytes.
///
/// # Errors
///
/// Returns `CaptchaError::Encode` if the encoder fails.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| CaptchaError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(png)
}

/// Rotates counter-clockwise by `degrees`, growing the canvas so no corner is clipped.
fn rotate_expanded(tile: &GrayImage, degrees: i32) -> GrayImage {
    if degrees == 0 {
        return tile.clone();
    }

    let theta = f32::from(i16::try_from(degrees).unwrap_or(0)).to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = tile.dimensions();
    let (w_f32, h_f32) = (px(w), px(h));
    let new_w = f32_to_u32(w_f32.mul_add(cos.abs(), h_f32 * sin.abs()).ceil()).max(w);
    let new_h = f32_to_u32(w_f32.mul_add(sin.abs(), h_f32 * cos.abs()).ceil()).max(h);

    let mut padded = GrayImage::new(new_w, new_h);
    image::imageops::replace(
        &mut padded,
        tile,
        i64::from((new_w - w) / 2),
        i64::from((new_h - h) / 2),
    );

    // imageproc rotates clockwise.
    rotate_about_center(&padded, -theta, Interpolation::Bilinear, Luma([0]))
}

/// Blends `ink` onto `img` weighted by `tile` coverage, with the tile's
/// top-left corner at (`x`, `y`). Clips at the canvas edges.
fn blend_tile(img: &mut RgbImage, tile: &GrayImage, x: i32, y: i32, ink: Rgb<u8>) {
    let (width, height) = img.dimensions();
    let width_i32 = i32::try_from(width).unwrap_or(i32::MAX);
    let height_i32 = i32::try_from(height).unwrap_or(i32::MAX);

    for (tx, ty, pixel) in tile.enumerate_pixels() {
        let alpha = u16::from(pixel[0]);
        if alpha == 0 {
            continue;
        }

        let gx = x.saturating_add(i32::try_from(tx).unwrap_or(i32::MAX));
        let gy = y.saturating_add(i32::try_from(ty).unwrap_or(i32::MAX));
        if (0..width_i32).contains(&gx)
            && (0..height_i32).contains(&gy)
            && let (Ok(gx_u32), Ok(gy_u32)) = (u32::try_from(gx), u32::try_from(gy))
        {
            let base = img.get_pixel_mut(gx_u32, gy_u32);
            for c in 0..3 {
                let blended =
                    (u16::from(ink[c]) * alpha + u16::from(base[c]) * (255 - alpha) + 127) / 255;
                base[c] = u8::try_from(blended).unwrap_or(u8::MAX);
            }
        }
    }
}

#[inline]
fn px(val: u32) -> f32 {
    f32::from(u16::try_from(val).unwrap_or(u16::MAX))
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f32_to_u32(val: f32) -> u32 {
    val.round().clamp(0.0, f32::from(u16::MAX)) as u32
}
