//! Captcha run management.
//!
//! Drives the text → compose → save pipeline a fixed number of times,
//! sequentially or across a bounded pool of worker threads.

use crate::captcha::generator::{CaptchaGenerator, GeneratorSettings};
use crate::captcha::output::OutputDir;
use crate::captcha::text::CaptchaText;
use crate::config::{CaptchaError, Config, Result};
use crate::fonts::FontStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, error, info};

/// One persisted captcha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCaptcha {
    pub text: CaptchaText,
    pub path: PathBuf,
}

pub struct CaptchaManager<S> {
    generator: CaptchaGenerator<S>,
    output: OutputDir,
    count: usize,
    text_length: usize,
    workers: usize,
    seed: Option<u64>,
}

impl<S: FontStore> CaptchaManager<S> {
    /// Creates a new `CaptchaManager` with configuration.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Config` if `config` fails [`Config::validate`].
    pub fn new(config: &Config, store: Arc<S>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: CaptchaGenerator::new(store, GeneratorSettings::from(config)),
            output: OutputDir::new(&config.output_dir, config.collision),
            count: config.count,
            text_length: config.text_length,
            workers: config.workers,
            seed: config.seed,
        })
    }

    #[must_use]
    pub const fn output(&self) -> &OutputDir {
        &self.output
    }

    /// Runs one pipeline iteration: generate text, compose, save.
    ///
    /// # Errors
    ///
    /// Propagates font selection, encoding and filesystem errors.
    pub fn generate_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GeneratedCaptcha> {
        let text = CaptchaText::random(rng, self.text_length);
        let img = self.generator.compose(&text, rng)?;
        let path = self.output.save(&img, &text)?;
        info!(text = %text, path = %path.display(), "Captcha generated");
        Ok(GeneratedCaptcha { text, path })
    }

    /// Generates the configured number of captchas.
    ///
    /// Job `j` draws from its own rng, seeded with `seed + j` when a seed is
    /// configured, so seeded runs produce the same captchas for any pool size.
    /// Results are returned in job order.
    ///
    /// # Errors
    ///
    /// Returns the first pipeline error; jobs not yet started are skipped.
    pub fn run(&self) -> Result<Vec<GeneratedCaptcha>> {
        if self.workers == 1 || self.count <= 1 {
            return (0..self.count)
                .map(|job| self.generate_one(&mut self.job_rng(job)))
                .collect();
        }
        self.run_pool()
    }

    fn job_rng(&self, job: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                StdRng::seed_from_u64(seed.wrapping_add(u64::try_from(job).unwrap_or(u64::MAX)))
            }
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    fn run_pool(&self) -> Result<Vec<GeneratedCaptcha>> {
        let next_job = AtomicUsize::new(0);
        let aborted = AtomicBool::new(false);
        let results: Mutex<Vec<(usize, GeneratedCaptcha)>> =
            Mutex::new(Vec::with_capacity(self.count));
        let first_error: Mutex<Option<CaptchaError>> = Mutex::new(None);
        let pool_size = self.workers.min(self.count);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..pool_size)
                .map(|worker| {
                    let (next_job, aborted, results, first_error) =
                        (&next_job, &aborted, &results, &first_error);
                    scope.spawn(move || {
                        loop {
                            if aborted.load(Ordering::Acquire) {
                                break;
                            }
                            let job = next_job.fetch_add(1, Ordering::AcqRel);
                            if job >= self.count {
                                break;
                            }

                            debug!(worker, job, "Worker picked job");
                            match self.generate_one(&mut self.job_rng(job)) {
                                Ok(captcha) => results
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .push((job, captcha)),
                                Err(e) => {
                                    error!(worker, job, error = %e, "Captcha generation failed");
                                    aborted.store(true, Ordering::Release);
                                    first_error
                                        .lock()
                                        .unwrap_or_else(PoisonError::into_inner)
                                        .get_or_insert(e);
                                    break;
                                }
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                if handle.join().is_err() {
                    aborted.store(true, Ordering::Release);
                    first_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .get_or_insert(CaptchaError::Worker("worker thread panicked".into()));
                }
            }
        });

        if let Some(e) = first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(e);
        }

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(job, _)| *job);
        Ok(results.into_iter().map(|(_, captcha)| captcha).collect())
    }
}
