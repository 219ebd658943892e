use crate::common::{MockFontServer, png_names};
use captchaforge::captcha::ALPHABET;
use captchaforge::test_utils::{create_test_config, seed_font_dir};
use captchaforge::{
    CaptchaError, CaptchaManager, CollisionPolicy, Config, DirFontStore, RemoteFontSource,
};
use std::sync::Arc;
use std::time::Duration;

fn local_manager(config: &Config) -> CaptchaManager<DirFontStore> {
    seed_font_dir(&config.font_dir);
    CaptchaManager::new(config, Arc::new(DirFontStore::new(&config.font_dir))).unwrap()
}

#[test]
fn test_run_writes_named_pngs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = (*create_test_config(dir.path())).clone();
    config.count = 3;
    config.collision = CollisionPolicy::Suffix;
    assert!(!config.output_dir.exists());

    let generated = local_manager(&config).run().unwrap();

    assert_eq!(generated.len(), 3);
    assert_eq!(png_names(&config.output_dir).len(), 3);
    for captcha in &generated {
        assert_eq!(captcha.text.len(), 6);
        assert!(captcha.text.as_str().bytes().all(|b| ALPHABET.contains(&b)));
        assert_eq!(captcha.path.parent(), Some(config.output_dir.as_path()));

        let img = image::open(&captcha.path).unwrap();
        assert_eq!((img.width(), img.height()), (200, 100));
    }
}

#[test]
fn test_run_provisions_fonts_from_remote() {
    let server = MockFontServer::spawn_default();
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let source = RemoteFontSource::new(server.listing_url(), Duration::from_secs(5)).unwrap();
    let store = DirFontStore::new(&config.font_dir).with_remote(source).unwrap();

    let generated = CaptchaManager::new(&config, Arc::new(store))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(generated.len(), config.count);
    assert!(config.font_dir.join("Good-One.ttf").is_file());
    assert!(config.font_dir.join("Good-Two.ttf").is_file());
}

#[test]
fn test_unreachable_remote_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let source =
        RemoteFontSource::new("http://127.0.0.1:1/listing", Duration::from_secs(1)).unwrap();
    let store = DirFontStore::new(&config.font_dir).with_remote(source).unwrap();

    let result = CaptchaManager::new(&config, Arc::new(store)).unwrap().run();

    assert!(matches!(
        result,
        Err(CaptchaError::NoFontsAvailable { attempts }) if attempts == config.font_max_attempts
    ));
    assert!(!config.output_dir.exists());
}

#[test]
fn test_worker_pool_generates_all_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = (*create_test_config(dir.path())).clone();
    config.count = 5;
    config.workers = 3;
    config.collision = CollisionPolicy::Suffix;

    let generated = local_manager(&config).run().unwrap();

    assert_eq!(generated.len(), 5);
    assert_eq!(png_names(&config.output_dir).len(), 5);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = (*create_test_config(dir.path())).clone();
    config.seed = Some(7);

    config.output_dir = dir.path().join("first");
    let first = local_manager(&config).run().unwrap();
    config.output_dir = dir.path().join("second");
    let second = local_manager(&config).run().unwrap();

    assert_eq!(
        png_names(&dir.path().join("first")),
        png_names(&dir.path().join("second"))
    );
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.text, b.text);
        assert_eq!(std::fs::read(&a.path).unwrap(), std::fs::read(&b.path).unwrap());
    }
}
