use async_trait::async_trait;

use crate::error::Result;

pub mod decode;
pub mod driver;
pub mod industry;
pub mod price;
pub mod request;
pub mod vci;

pub use driver::{FetchReport, PriceDriver};
pub use industry::{fetch_industry_map, IndustryMap};
pub use price::{is_rate_limit, PriceFetcher, PriceOutcome};
pub use vci::VciClient;

pub type FetchResult<T> = Result<T>;

/// One `(symbol, industry)` row from the provider's classification listing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndustryRow {
    pub symbol: String,
    pub industry: String,
}

/// A daily bar reduced to what the price refresh needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    /// Bar open time as unix seconds.
    pub timestamp: i64,
    /// Close in the provider's reporting unit.
    pub close: f64,
}

/// Upstream market-data provider.
///
/// Implementations own their network timeouts; callers never wrap these
/// calls in a timeout of their own.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Single batch call returning the industry classification of every listed symbol.
    async fn list_industries(&self) -> FetchResult<Vec<IndustryRow>>;

    /// Daily bars for `symbol` covering roughly the last `lookback_days`,
    /// in any order.
    async fn daily_bars(&self, symbol: &str, lookback_days: u32) -> FetchResult<Vec<DailyBar>>;
}

#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}
