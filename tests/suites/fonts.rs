use crate::common::{MockFontServer, MockResponse};
use captchaforge::test_utils::seed_font_dir;
use captchaforge::{CaptchaError, DirFontStore, FontId, FontStore, RemoteFontSource};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::time::Duration;

fn remote_store(dir: &std::path::Path, server: &MockFontServer) -> DirFontStore {
    let source = RemoteFontSource::new(server.listing_url(), Duration::from_secs(5)).unwrap();
    DirFontStore::new(dir).with_remote(source).unwrap()
}

#[test]
fn test_provisioning_downloads_listed_fonts() {
    let server = MockFontServer::spawn_default();
    let dir = tempfile::tempdir().unwrap();
    let fonts_dir = dir.path().join("fonts");
    let store = remote_store(&fonts_dir, &server);

    let available = store.ensure().unwrap();

    assert_eq!(available, 3);
    assert_eq!(
        store.list().unwrap(),
        vec![
            FontId::new("Corrupt.ttf"),
            FontId::new("Good-One.ttf"),
            FontId::new("Good-Two.ttf"),
        ]
    );
    assert!(!fonts_dir.join("Missing.ttf").exists());
    assert!(!fonts_dir.join("README.md").exists());
    assert!(!dir.path().join("Escape.ttf").exists());
    // listing + four font downloads
    assert_eq!(server.request_count(), 5);
}

#[test]
fn test_existing_fonts_skip_remote() {
    let server = MockFontServer::spawn_default();
    let dir = tempfile::tempdir().unwrap();
    seed_font_dir(dir.path());
    let store = remote_store(dir.path(), &server);

    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..10 {
        store.pick_random(&mut rng, 55.0, 3).unwrap();
    }

    assert_eq!(store.ensure().unwrap(), 2);
    assert_eq!(server.request_count(), 0);
}

#[test]
fn test_downloaded_corrupt_font_is_evicted() {
    let server = MockFontServer::spawn_default();
    let dir = tempfile::tempdir().unwrap();
    let store = remote_store(dir.path(), &server);

    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..100 {
        let asset = store.pick_random(&mut rng, 55.0, 8).unwrap();
        assert_ne!(asset.id.as_str(), "Corrupt.ttf");
    }

    assert!(!dir.path().join("Corrupt.ttf").exists());
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn test_listing_failure_yields_no_fonts() {
    let server = MockFontServer::spawn(|_| {
        HashMap::from([("/listing".to_string(), MockResponse::status(500))])
    });
    let dir = tempfile::tempdir().unwrap();
    let store = remote_store(dir.path(), &server);
    let mut rng = StdRng::seed_from_u64(0);

    let result = store.pick_random(&mut rng, 55.0, 3);

    assert!(matches!(
        result,
        Err(CaptchaError::NoFontsAvailable { attempts: 3 })
    ));
    assert_eq!(server.request_count(), 3);
}

#[test]
fn test_malformed_listing_yields_no_fonts() {
    let server = MockFontServer::spawn(|_| {
        HashMap::from([(
            "/listing".to_string(),
            MockResponse::ok(&b"{\"message\": \"rate limited\"}"[..]),
        )])
    });
    let dir = tempfile::tempdir().unwrap();
    let store = remote_store(dir.path(), &server);

    assert_eq!(store.ensure().unwrap(), 0);
}
