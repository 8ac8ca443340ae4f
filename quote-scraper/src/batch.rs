use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;

use crate::config::BatchConfig;
use crate::extractor::QuoteExtractor;
use crate::model::{Cost, QuoteRequest, QuoteResult};
use crate::store::{ResultStore, StoreError};
use crate::webdriver::Launcher;

/// Anything that can turn a request into quote results. Implementations
/// report failures as sentinel costs rather than errors.
pub trait QuoteSource {
    fn fetch(&self, request: &QuoteRequest) -> Vec<QuoteResult>;
}

impl<L: Launcher> QuoteSource for QuoteExtractor<L> {
    fn fetch(&self, request: &QuoteRequest) -> Vec<QuoteResult> {
        self.fetch_quotes(request)
    }
}

pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<P: Pause + ?Sized> Pause for &mut P {
    fn pause(&mut self, duration: Duration) {
        (**self).pause(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    /// Already present in the results file.
    Skipped,
    Fetched { attempts: u32, usable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position in the request list.
    pub position: usize,
    pub total: usize,
    pub state: String,
    pub zip: String,
    pub status: ProgressStatus,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Results written during this run, in order.
    pub results: Vec<QuoteResult>,
    pub skipped: usize,
    pub duplicates: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub errors: usize,
}

impl BatchReport {
    fn record(&mut self, result: QuoteResult) {
        match result.cost {
            Cost::NotFound => self.not_found += 1,
            Cost::Error => self.errors += 1,
            // Zero premiums count as errors, they are never usable downstream.
            Cost::Amount(_) if !result.cost.is_usable() => self.errors += 1,
            Cost::Amount(_) => self.succeeded += 1,
        }
        self.results.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &QuoteResult> {
        self.results.iter().filter(|r| !r.cost.is_usable())
    }
}

/// Runs requests one at a time against a [`QuoteSource`], persisting every
/// result as soon as it is final.
pub struct BatchRunner<'a, S: QuoteSource, P: Pause, R: Rng> {
    source: &'a S,
    store: &'a ResultStore,
    config: BatchConfig,
    pause: P,
    rng: R,
    observer: Option<Box<dyn FnMut(&Progress) + 'a>>,
}

impl<'a, S: QuoteSource, P: Pause, R: Rng> BatchRunner<'a, S, P, R> {
    pub fn new(source: &'a S, store: &'a ResultStore, config: BatchConfig, pause: P, rng: R) -> Self {
        BatchRunner {
            source,
            store,
            config,
            pause,
            rng,
            observer: None,
        }
    }

    pub fn on_progress<F: FnMut(&Progress) + 'a>(mut self, observer: F) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Processes `requests`, skipping any (state, ZIP) already in the store.
    ///
    /// Only failures to read or append the results file are returned as
    /// errors; calculator failures end up as sentinel rows.
    pub fn run_batch(&mut self, requests: &[QuoteRequest]) -> Result<BatchReport, StoreError> {
        // Resume from whatever an earlier run already wrote
        let mut done = self.store.completed_keys()?;
        if !done.is_empty() {
            info!(
                "Found {} ZIPs already in {}, resuming",
                done.len(),
                self.store.path().display()
            );
        }

        let mut report = BatchReport::default();
        let mut seen = HashSet::new();
        let total = requests.len();
        let mut fetched_any = false;

        for (i, request) in requests.iter().enumerate() {
            let key = request.key();

            // Repeated in the input list
            if !seen.insert(key.clone()) {
                report.duplicates += 1;
                continue;
            }
            if done.contains(&key) {
                info!("[{}/{}] Skipping {} (already processed)", i + 1, total, request.zip());
                report.skipped += 1;
                self.notify(i + 1, total, request, ProgressStatus::Skipped);
                continue;
            }

            // Space out calculator hits
            if fetched_any {
                let delay = self.config.politeness.sample(&mut self.rng);
                self.pause.pause(delay);
            }
            fetched_any = true;

            info!("[{}/{}] Processing {}", i + 1, total, request);
            let (results, attempts) = self.fetch_with_retry(request);
            let usable = results.iter().all(|r| r.cost.is_usable());

            // Persist every row before moving on
            for result in results {
                self.store.append(&result)?;
                report.record(result);
            }
            done.insert(key);
            self.notify(i + 1, total, request, ProgressStatus::Fetched { attempts, usable });
        }

        Ok(report)
    }

    fn fetch_with_retry(&mut self, request: &QuoteRequest) -> (Vec<QuoteResult>, u32) {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let mut results = self.source.fetch(request);

            // An empty answer is a failed attempt
            if results.is_empty() {
                results.push(QuoteResult::error(request));
            }
            if results.iter().all(|r| r.cost.is_usable()) || attempt >= max_attempts {
                if attempt > 1 && !results.iter().all(|r| r.cost.is_usable()) {
                    warn!("Giving up on {} after {} attempts", request, attempt);
                }
                return (results, attempt);
            }

            // Back off before the next attempt
            let delay = self.config.retry.delay.sample(&mut self.rng);
            warn!(
                "Attempt {}/{} for {} failed, retrying in {:.1}s",
                attempt,
                max_attempts,
                request,
                delay.as_secs_f64()
            );
            self.pause.pause(delay);
            attempt += 1;
        }
    }

    fn notify(&mut self, position: usize, total: usize, request: &QuoteRequest, status: ProgressStatus) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&Progress {
                position,
                total,
                state: request.state().to_string(),
                zip: request.zip().to_string(),
                status,
            });
        }
    }
}
