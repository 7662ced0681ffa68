use std::sync::Arc;

use log::{debug, info, warn};
use tokio::time::sleep;

use crate::config::FetchPolicy;
use crate::error::AppError;

use super::{FetchResult, MarketData};

/// Lowercased fragments that identify a throttling response.
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "429", "too many requests", "giới hạn"];

/// Result of one driver-level fetch for a single symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceOutcome {
    pub symbol: String,
    /// Price in the canonical unit, `None` when the fetch failed.
    pub price: Option<f64>,
    /// Cooldown sleeps taken because of rate limiting.
    pub cooldowns: u32,
    /// The final failure was a rate-limit response.
    pub rate_limited: bool,
}

impl PriceOutcome {
    pub fn is_success(&self) -> bool {
        self.price.is_some()
    }
}

pub fn is_rate_limit(err: &AppError) -> bool {
    if matches!(err, AppError::RateLimited(_)) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Fetches the latest close for one symbol, retrying only on rate limits.
#[derive(Clone)]
pub struct PriceFetcher {
    market: Arc<dyn MarketData>,
    policy: FetchPolicy,
}

impl PriceFetcher {
    pub fn new(market: Arc<dyn MarketData>, policy: FetchPolicy) -> Self {
        Self { market, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Never fails: errors are logged and reported as an outcome without a price.
    pub async fn fetch(&self, symbol: &str) -> PriceOutcome {
        let max_retries = self.policy.max_retries;
        let mut cooldowns = 0;

        loop {
            match self.fetch_once(symbol).await {
                Ok(price) => {
                    debug!("{symbol}: {price}");
                    return PriceOutcome {
                        symbol: symbol.to_string(),
                        price: Some(price),
                        cooldowns,
                        rate_limited: false,
                    };
                }
                Err(err) if is_rate_limit(&err) => {
                    if cooldowns < max_retries {
                        cooldowns += 1;
                        info!(
                            "Rate limited on {symbol}, retry {cooldowns}/{max_retries} in {}s",
                            self.policy.cooldown.as_secs_f64()
                        );
                        sleep(self.policy.cooldown).await;
                        continue;
                    }

                    warn!("{symbol}: still rate limited after {max_retries} retries");
                    return PriceOutcome {
                        symbol: symbol.to_string(),
                        price: None,
                        cooldowns,
                        rate_limited: true,
                    };
                }
                Err(err) => {
                    warn!("{symbol}: {err}");
                    return PriceOutcome {
                        symbol: symbol.to_string(),
                        price: None,
                        cooldowns,
                        rate_limited: false,
                    };
                }
            }
        }
    }

    async fn fetch_once(&self, symbol: &str) -> FetchResult<f64> {
        let bars = self
            .market
            .daily_bars(symbol, self.policy.lookback_days)
            .await?;

        let latest = bars
            .iter()
            .filter(|bar| bar.close.is_finite())
            .max_by_key(|bar| bar.timestamp)
            .ok_or_else(|| AppError::message(format!("No daily bars returned for {symbol}")))?;

        let price = latest.close * self.policy.price_scale;
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::message(format!(
                "Rejected close {} for {symbol}",
                latest.close
            )));
        }

        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{DailyBar, IndustryRow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with `error` for the first `failures` calls, then returns `bars`.
    struct Flaky {
        failures: u32,
        error: fn() -> AppError,
        bars: Vec<DailyBar>,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: fn() -> AppError, bars: Vec<DailyBar>) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                bars,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketData for Flaky {
        async fn list_industries(&self) -> FetchResult<Vec<IndustryRow>> {
            Ok(Vec::new())
        }

        async fn daily_bars(&self, _symbol: &str, _days: u32) -> FetchResult<Vec<DailyBar>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(self.bars.clone())
            }
        }
    }

    fn policy(max_retries: u32) -> FetchPolicy {
        FetchPolicy {
            cooldown: Duration::ZERO,
            max_retries,
            inter_request_delay: Duration::ZERO,
            ..FetchPolicy::default()
        }
    }

    fn bar(timestamp: i64, close: f64) -> DailyBar {
        DailyBar { timestamp, close }
    }

    fn rate_limited() -> AppError {
        AppError::message("Rate limit exceeded. Please retry later")
    }

    #[test]
    fn classifies_rate_limit_errors() {
        assert!(is_rate_limit(&AppError::RateLimited("x".into())));
        assert!(is_rate_limit(&rate_limited()));
        assert!(is_rate_limit(&AppError::message("HTTP 429 returned")));
        assert!(is_rate_limit(&AppError::message("Bạn đã vượt quá GIỚI HẠN truy cập")));
        assert!(!is_rate_limit(&AppError::message("connection reset")));
    }

    #[tokio::test]
    async fn scales_latest_close() {
        let market = Flaky::new(0, rate_limited, vec![bar(2, 12.5), bar(1, 11.0)]);
        let fetcher = PriceFetcher::new(market, policy(3));

        let outcome = fetcher.fetch("XYZ").await;
        assert_eq!(outcome.price, Some(12500.0));
        assert_eq!(outcome.cooldowns, 0);
    }

    #[tokio::test]
    async fn retries_until_rate_limit_clears() {
        for (k, m) in [(0u32, 3u32), (2, 3), (3, 3), (4, 3), (1, 0), (5, 2)] {
            let market = Flaky::new(k, rate_limited, vec![bar(1, 10.0)]);
            let fetcher = PriceFetcher::new(market.clone(), policy(m));

            let outcome = fetcher.fetch("AAA").await;
            assert_eq!(outcome.is_success(), k <= m, "k={k} m={m}");
            assert_eq!(outcome.cooldowns, k.min(m), "k={k} m={m}");
            assert_eq!(outcome.rate_limited, k > m, "k={k} m={m}");
            assert_eq!(market.calls.load(Ordering::SeqCst), k.min(m) + 1, "k={k} m={m}");
        }
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let market = Flaky::new(1, || AppError::message("symbol delisted"), vec![bar(1, 1.0)]);
        let fetcher = PriceFetcher::new(market.clone(), policy(3));

        let outcome = fetcher.fetch("AAA").await;
        assert!(!outcome.is_success());
        assert!(!outcome.rate_limited);
        assert_eq!(outcome.cooldowns, 0);
        assert_eq!(market.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_or_invalid_bars_fail() {
        let empty = PriceFetcher::new(Flaky::new(0, rate_limited, Vec::new()), policy(3));
        assert_eq!(empty.fetch("AAA").await.price, None);

        let negative =
            PriceFetcher::new(Flaky::new(0, rate_limited, vec![bar(1, -2.0)]), policy(3));
        assert_eq!(negative.fetch("AAA").await.price, None);

        let nan_latest = PriceFetcher::new(
            Flaky::new(0, rate_limited, vec![bar(1, 3.0), bar(2, f64::NAN)]),
            policy(3),
        );
        assert_eq!(nan_latest.fetch("AAA").await.price, Some(3000.0));
    }
}
