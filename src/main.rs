//! `captchaforge` - Synthetic captcha image generator.
//!
//! Copyright (C) 2026 The captchaforge Authors
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Loads configuration, sets up logging, provisions fonts, and writes the
//! configured number of captcha images to disk.

use captchaforge::{CaptchaManager, Config, DirFontStore, LogFormat, RemoteFontSource, Result};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking);

    match LogFormat::from_env() {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Captcha run failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!(
        count = config.count,
        text_length = config.text_length,
        width = config.width,
        height = config.height,
        font_dir = %config.font_dir.display(),
        output_dir = %config.output_dir.display(),
        workers = config.workers,
        "Generator initialized"
    );

    let mut store = DirFontStore::new(&config.font_dir);
    if let Some(url) = &config.font_source_url {
        let source = RemoteFontSource::new(url, Duration::from_secs(config.http_timeout_secs))?;
        store = store.with_remote(source)?;
    }

    let manager = CaptchaManager::new(&config, Arc::new(store))?;
    let started = Instant::now();
    let generated = manager.run()?;

    info!(
        generated = generated.len(),
        output_dir = %manager.output().root().display(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Run complete"
    );
    Ok(())
}
