use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};

use crate::config::ProviderConfig;
use crate::error::{AppError, Context};

use super::request::build_headers;
use super::{decode, DailyBar, FetchResult, IndustryRow, MarketData};

/// HTTP client for the VCI trading API.
pub struct VciClient {
    client: Client,
    config: ProviderConfig,
}

impl VciClient {
    pub fn new(config: ProviderConfig) -> FetchResult<Self> {
        let headers = build_headers(&config.headers)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .context("Failed to construct provider HTTP client")?;

        Ok(Self { client, config })
    }

    async fn read_body(response: Response, what: &str) -> FetchResult<String> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(format!(
                "{what} returned HTTP 429"
            )));
        }
        if !status.is_success() {
            return Err(AppError::message(format!(
                "{what} failed with status {status}"
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketData for VciClient {
    async fn list_industries(&self) -> FetchResult<Vec<IndustryRow>> {
        let listing = &self.config.listing;
        let response = self
            .client
            .post(&listing.url)
            .json(&serde_json::json!({
                "query": listing.query,
                "variables": {},
            }))
            .send()
            .await?;

        let body = Self::read_body(response, "Industry listing request").await?;
        decode::parse_industry_listing(
            &body,
            &listing.data_path,
            &listing.symbol_field,
            &listing.industry_field,
        )
    }

    async fn daily_bars(&self, symbol: &str, lookback_days: u32) -> FetchResult<Vec<DailyBar>> {
        let history = &self.config.history;
        let response = self
            .client
            .post(&history.url)
            .json(&serde_json::json!({
                "timeFrame": history.time_frame,
                "symbols": [symbol],
                "to": Utc::now().timestamp(),
                "countBack": lookback_days,
            }))
            .send()
            .await?;

        let body = Self::read_body(response, &format!("History request for {symbol}")).await?;
        decode::parse_chart_bars(&body, symbol)
    }
}
