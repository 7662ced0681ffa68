use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::config::{Config, ExecutionMode};
use crate::error::{AppError, Result};
use crate::fetch::{fetch_industry_map, MarketData, PriceDriver, PriceFetcher};
use crate::records::{merge, Records, Snapshot};
use crate::symbols::{resolve_symbols, SymbolStore};
use crate::utils::snapshot_timestamp;

/// Counts reported at the end of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub symbols: usize,
    pub fresh_prices: usize,
    pub carried_forward: usize,
    /// Symbols with a price in the written snapshot.
    pub priced: usize,
    pub industries: usize,
    pub rate_limited: usize,
    pub elapsed: Duration,
    pub written: bool,
}

/// One refresh run: resolve symbols, fetch, merge with the previous snapshot, write.
pub struct Pipeline {
    config: Config,
    market: Arc<dyn MarketData>,
    store: Option<Arc<dyn SymbolStore>>,
    records: Records,
}

impl Pipeline {
    pub fn new(
        config: Config,
        market: Arc<dyn MarketData>,
        store: Option<Arc<dyn SymbolStore>>,
    ) -> Self {
        let records = Records::new(config.output_path.clone());
        Self {
            config,
            market,
            store,
            records,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        info!(
            "Starting price refresh into {}",
            self.records.snapshot_path().display()
        );

        let previous = self.records.load_previous();
        if !previous.is_empty() {
            info!(
                "Previous snapshot from {} holds {} prices",
                previous.updated_at,
                previous.prices.len()
            );
        }

        info!("Fetching industry classification...");
        let industries = fetch_industry_map(self.market.as_ref()).await;

        let symbols =
            resolve_symbols(&self.config.source, &industries, self.store.as_deref()).await;
        if symbols.is_empty() {
            error!("No symbols to refresh, leaving the snapshot untouched");
            return Err(AppError::EmptyUniverse);
        }

        self.log_plan(symbols.len());

        let fetcher = PriceFetcher::new(Arc::clone(&self.market), self.config.policy.clone());
        let driver = PriceDriver::new(fetcher, self.config.execution, self.config.progress_every());
        let universe: Vec<String> = symbols.iter().cloned().collect();
        let report = driver.run(&universe).await;

        info!(
            "Fetched {}/{} prices ({} rate limited, {:.0}s)",
            report.succeeded,
            report.attempted,
            report.rate_limited,
            report.elapsed.as_secs_f64()
        );

        let merged = merge(&symbols, &report.prices, &industries, &previous);
        let carried_forward = merged.carried_forward(&report.prices);
        let snapshot = Snapshot::new(snapshot_timestamp(), merged);

        let written = if self.config.dry_run {
            info!("Dry run, snapshot not written");
            false
        } else {
            match self.records.save(&snapshot) {
                Ok(()) => true,
                Err(err) => {
                    error!("{err}; previous snapshot left in place");
                    false
                }
            }
        };

        let summary = RunSummary {
            symbols: symbols.len(),
            fresh_prices: report.succeeded,
            carried_forward,
            priced: snapshot.total_symbols,
            industries: snapshot.industries.len(),
            rate_limited: report.rate_limited,
            elapsed: started.elapsed(),
            written,
        };

        info!(
            "Done: {} prices ({} fresh, {} carried forward), {} industries{} ({:.0}s)",
            summary.priced,
            summary.fresh_prices,
            summary.carried_forward,
            summary.industries,
            if written { ", snapshot saved" } else { "" },
            summary.elapsed.as_secs_f64()
        );

        Ok(summary)
    }

    fn log_plan(&self, total: usize) {
        let delay = self.config.policy.inter_request_delay.as_secs_f64();
        let rounds = match self.config.execution {
            ExecutionMode::Sequential => total as f64,
            ExecutionMode::Parallel { workers } => (total as f64 / workers.max(1) as f64).ceil(),
        };
        info!(
            "Refreshing {total} symbols, {} mode, {}s between requests, estimated ~{:.0} min",
            self.config.execution,
            delay,
            rounds * delay / 60.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchPolicy, SymbolSourceConfig};
    use crate::fetch::{DailyBar, FetchResult, IndustryRow};
    use crate::records::load_previous;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    /// Provider stub: raw closes per symbol; symbols without one fail.
    struct Stub {
        industries: Option<Vec<(&'static str, &'static str)>>,
        closes: HashMap<&'static str, f64>,
    }

    #[async_trait]
    impl MarketData for Stub {
        async fn list_industries(&self) -> FetchResult<Vec<IndustryRow>> {
            let rows = self
                .industries
                .as_ref()
                .ok_or_else(|| AppError::message("listing offline"))?;
            Ok(rows
                .iter()
                .map(|(symbol, industry)| IndustryRow {
                    symbol: symbol.to_string(),
                    industry: industry.to_string(),
                })
                .collect())
        }

        async fn daily_bars(&self, symbol: &str, _days: u32) -> FetchResult<Vec<DailyBar>> {
            match self.closes.get(symbol) {
                Some(close) => Ok(vec![
                    DailyBar {
                        timestamp: 1,
                        close: close - 1.0,
                    },
                    DailyBar {
                        timestamp: 2,
                        close: *close,
                    },
                ]),
                None => Err(AppError::message(format!("no data for {symbol}"))),
            }
        }
    }

    fn config(output: &Path, source: SymbolSourceConfig) -> Config {
        Config {
            output_path: output.to_path_buf(),
            source,
            policy: FetchPolicy {
                cooldown: Duration::ZERO,
                inter_request_delay: Duration::ZERO,
                ..FetchPolicy::default()
            },
            ..Config::builtin()
        }
    }

    fn symbol_file(dir: &Path, symbols: &[&str]) -> SymbolSourceConfig {
        let path = dir.join("symbols.json");
        let json = serde_json::json!({ "symbols": symbols });
        fs::write(&path, json.to_string()).expect("write symbols");
        SymbolSourceConfig::File { path }
    }

    #[tokio::test]
    async fn failed_fetch_carries_previous_price() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("prices.json");
        fs::write(&output, r#"{"prices": {"AAA": 10000}}"#).expect("seed");

        let market = Arc::new(Stub {
            industries: None,
            closes: HashMap::from([("BBB", 20.0)]),
        });
        let source = symbol_file(dir.path(), &["AAA", "BBB"]);
        let pipeline = Pipeline::new(config(&output, source), market, None);

        let summary = pipeline.run().await.expect("run");
        assert_eq!(summary.fresh_prices, 1);
        assert_eq!(summary.carried_forward, 1);
        assert!(summary.written);

        let snapshot = load_previous(&output);
        assert_eq!(snapshot.prices.get("AAA"), Some(&10000.0));
        assert_eq!(snapshot.prices.get("BBB"), Some(&20000.0));
        assert_eq!(snapshot.total_symbols, 2);
        assert!(snapshot.updated_at.ends_with("+07:00"));
    }

    #[tokio::test]
    async fn applies_price_scale_to_latest_close() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("prices.json");

        let market = Arc::new(Stub {
            industries: Some(vec![("XYZ", "Xây dựng")]),
            closes: HashMap::from([("XYZ", 12.5)]),
        });
        let pipeline = Pipeline::new(
            config(&output, SymbolSourceConfig::Classification),
            market,
            None,
        );

        pipeline.run().await.expect("run");
        let snapshot = load_previous(&output);
        assert_eq!(snapshot.prices.get("XYZ"), Some(&12500.0));
        assert_eq!(
            snapshot.industries.get("XYZ").map(String::as_str),
            Some("Xây dựng")
        );
    }

    #[tokio::test]
    async fn empty_universe_aborts_without_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("prices.json");
        fs::write(&output, "untouched").expect("seed");

        let market = Arc::new(Stub {
            industries: None,
            closes: HashMap::new(),
        });
        let pipeline = Pipeline::new(
            config(&output, SymbolSourceConfig::Classification),
            market,
            None,
        );

        let err = pipeline.run().await.expect_err("should abort");
        assert!(matches!(err, AppError::EmptyUniverse));
        assert_eq!(fs::read_to_string(&output).expect("read"), "untouched");
    }

    #[tokio::test]
    async fn empty_universe_without_previous_file_creates_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("prices.json");
        let source = symbol_file(dir.path(), &[]);

        let market = Arc::new(Stub {
            industries: Some(vec![("AAA", "Ngân hàng")]),
            closes: HashMap::new(),
        });
        let pipeline = Pipeline::new(config(&output, source), market, None);

        assert!(matches!(
            pipeline.run().await,
            Err(AppError::EmptyUniverse)
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn stale_symbols_are_dropped_and_industries_carried() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("prices.json");
        let seed = r#"{
            "prices": {"OLD": 1.0, "AAA": 2.0},
            "industries": {"AAA": "Thép", "OLD": "Khác"}
        }"#;
        fs::write(&output, seed).expect("seed");

        let market = Arc::new(Stub {
            industries: None,
            closes: HashMap::new(),
        });
        let source = symbol_file(dir.path(), &["aaa"]);
        let pipeline = Pipeline::new(config(&output, source), market, None);

        let summary = pipeline.run().await.expect("run");
        assert_eq!(summary.fresh_prices, 0);

        let snapshot = load_previous(&output);
        assert_eq!(snapshot.prices.len(), 1);
        assert_eq!(snapshot.prices.get("AAA"), Some(&2.0));
        assert_eq!(snapshot.industries.get("AAA").map(String::as_str), Some("Thép"));
        assert!(!snapshot.industries.contains_key("OLD"));
    }

    #[tokio::test]
    async fn dry_run_leaves_file_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("prices.json");

        let market = Arc::new(Stub {
            industries: Some(vec![("AAA", "Ngân hàng")]),
            closes: HashMap::from([("AAA", 1.0)]),
        });
        let mut cfg = config(&output, SymbolSourceConfig::Classification);
        cfg.dry_run = true;
        cfg.execution = ExecutionMode::Parallel { workers: 2 };

        let summary = Pipeline::new(cfg, market, None).run().await.expect("run");
        assert!(!summary.written);
        assert_eq!(summary.priced, 1);
        assert!(!output.exists());
    }
}
