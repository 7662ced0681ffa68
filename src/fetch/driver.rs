use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::info;
use tokio::time::sleep;

use crate::config::ExecutionMode;

use super::{ensure_concurrency_limit, PriceFetcher, PriceOutcome};

/// Aggregated outcome of one pass over the symbol universe.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub prices: BTreeMap<String, f64>,
    pub attempted: usize,
    pub succeeded: usize,
    pub rate_limited: usize,
    pub elapsed: Duration,
}

impl FetchReport {
    fn record(&mut self, outcome: PriceOutcome) {
        self.attempted += 1;
        if outcome.rate_limited {
            self.rate_limited += 1;
        }
        if let Some(price) = outcome.price {
            self.succeeded += 1;
            self.prices.insert(outcome.symbol, price);
        }
    }
}

/// Runs one price fetch per symbol, either paced one at a time or through a bounded pool.
pub struct PriceDriver {
    fetcher: PriceFetcher,
    mode: ExecutionMode,
    progress_every: usize,
    progress_counter: Arc<AtomicUsize>,
}

impl PriceDriver {
    pub fn new(fetcher: PriceFetcher, mode: ExecutionMode, progress_every: usize) -> Self {
        Self {
            fetcher,
            mode,
            progress_every: progress_every.max(1),
            progress_counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Completed fetches of the current or last run.
    pub fn progress(&self) -> usize {
        self.progress_counter.load(Ordering::SeqCst)
    }

    pub async fn run(&self, symbols: &[String]) -> FetchReport {
        let mut seen = HashSet::with_capacity(symbols.len());
        let unique: Vec<String> = symbols
            .iter()
            .filter(|symbol| seen.insert(symbol.as_str()))
            .cloned()
            .collect();

        self.progress_counter.store(0, Ordering::SeqCst);
        let started = Instant::now();

        let mut report = match self.mode {
            ExecutionMode::Sequential => self.run_sequential(unique, started).await,
            ExecutionMode::Parallel { workers } => {
                self.run_parallel(unique, ensure_concurrency_limit(workers), started)
                    .await
            }
        };

        report.elapsed = started.elapsed();
        report
    }

    async fn run_sequential(&self, symbols: Vec<String>, started: Instant) -> FetchReport {
        let total = symbols.len();
        let delay = self.fetcher.policy().inter_request_delay;
        let mut report = FetchReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            let outcome = self.fetcher.fetch(symbol).await;
            report.record(outcome);

            let done = self.progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
            self.log_progress(done, total, report.succeeded, started);

            if i + 1 < total && !delay.is_zero() {
                sleep(delay).await;
            }
        }

        report
    }

    async fn run_parallel(
        &self,
        symbols: Vec<String>,
        workers: usize,
        started: Instant,
    ) -> FetchReport {
        let total = symbols.len();
        let delay = self.fetcher.policy().inter_request_delay;
        let succeeded = Arc::new(AtomicUsize::new(0));
        let dispatched = Arc::new(AtomicUsize::new(0));

        // Each buffered slot acts as a worker: it holds its slot through the
        // pacing delay so one slot never issues requests closer than `delay`.
        // Once every symbol is dispatched there is nothing left to pace.
        let outcomes: Vec<PriceOutcome> = stream::iter(symbols.into_iter())
            .map(|symbol| {
                dispatched.fetch_add(1, Ordering::SeqCst);
                let dispatched = Arc::clone(&dispatched);
                let fetcher = &self.fetcher;
                let progress_counter = Arc::clone(&self.progress_counter);
                let succeeded = Arc::clone(&succeeded);
                async move {
                    let outcome = fetcher.fetch(&symbol).await;

                    let ok = if outcome.is_success() {
                        succeeded.fetch_add(1, Ordering::SeqCst) + 1
                    } else {
                        succeeded.load(Ordering::SeqCst)
                    };
                    let done = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    self.log_progress(done, total, ok, started);

                    if !delay.is_zero() && dispatched.load(Ordering::SeqCst) < total {
                        sleep(delay).await;
                    }
                    outcome
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut report = FetchReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    fn log_progress(&self, done: usize, total: usize, succeeded: usize, started: Instant) {
        if done % self.progress_every == 0 {
            info!(
                "{done}/{total} fetched ({succeeded} ok, {:.0}s)",
                started.elapsed().as_secs_f64()
            );
        }
    }
}
