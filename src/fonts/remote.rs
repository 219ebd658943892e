//! Remote font repository client.
//!
//! Fetches a directory listing of font files and downloads individual entries.

use crate::config::{CaptchaError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Extension of font files the store understands.
pub const FONT_EXTENSION: &str = ".ttf";

const USER_AGENT: &str = concat!("captchaforge/", env!("CARGO_PKG_VERSION"));

/// Returns true for file names ending in [`FONT_EXTENSION`], ignoring case.
#[must_use]
pub fn is_font_file(name: &str) -> bool {
    name.len() > FONT_EXTENSION.len()
        && name
            .get(name.len() - FONT_EXTENSION.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(FONT_EXTENSION))
}

/// One entry of the remote directory listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteFontEntry {
    pub name: String,
    /// Absent for sub-directories.
    pub download_url: Option<String>,
}

/// HTTP client for a directory-listing endpoint of a font repository.
#[derive(Clone)]
pub struct RemoteFontSource {
    client: Client,
    listing_url: String,
}

impl RemoteFontSource {
    /// Creates a client for `listing_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Http` if the HTTP client cannot be built.
    pub fn new(listing_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CaptchaError::Http(e.to_string()))?;
        Ok(Self {
            client,
            listing_url: listing_url.into(),
        })
    }

    #[must_use]
    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    /// Fetches the listing and keeps downloadable font entries.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Http` on transport failure, non-200 status, or
    /// a body that is not a JSON array of entries.
    pub async fn list(&self) -> Result<Vec<RemoteFontEntry>> {
        let response = self
            .client
            .get(&self.listing_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CaptchaError::Http(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(CaptchaError::Http(format!(
                "listing {} returned {}",
                self.listing_url,
                response.status()
            )));
        }

        let entries: Vec<RemoteFontEntry> = response
            .json()
            .await
            .map_err(|e| CaptchaError::Http(format!("listing decode failed: {e}")))?;

        let fonts: Vec<RemoteFontEntry> = entries
            .into_iter()
            .filter(|e| is_font_file(&e.name) && e.download_url.is_some())
            .collect();

        debug!(url = %self.listing_url, fonts = fonts.len(), "Font listing fetched");
        Ok(fonts)
    }

    /// Downloads the raw bytes of `entry`.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Http` on transport failure, non-200 status, or
    /// when the entry has no download URL.
    pub async fn download(&self, entry: &RemoteFontEntry) -> Result<Vec<u8>> {
        let Some(url) = entry.download_url.as_deref() else {
            return Err(CaptchaError::Http(format!(
                "{} has no download url",
                entry.name
            )));
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CaptchaError::Http(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(CaptchaError::Http(format!(
                "download {url} returned {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CaptchaError::Http(e.to_string()))?;
        Ok(body.to_vec())
    }
}
