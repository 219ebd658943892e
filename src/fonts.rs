//! Font provisioning.
//!
//! Local font storage, random selection, and download from a remote repository.

pub mod remote;
pub mod store;

pub use remote::{FONT_EXTENSION, RemoteFontEntry, RemoteFontSource, is_font_file};
pub use store::{DirFontStore, FontAsset, FontId, FontStore};
