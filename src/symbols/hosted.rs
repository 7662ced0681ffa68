use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::HostedStoreConfig;
use crate::error::{AppError, Context, Result};
use crate::fetch::{decode, request};

/// Remote table holding the portfolio symbols.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    /// Raw values of the configured column, not yet normalised.
    async fn fetch_symbols(&self) -> Result<Vec<String>>;
}

/// PostgREST-style store (`GET {base}/rest/v1/{table}?select={column}`).
///
/// Credentials are read from the environment at query time, so a store
/// can be built even when they are missing; the query then fails.
pub struct RestSymbolStore {
    client: Client,
    config: HostedStoreConfig,
}

impl RestSymbolStore {
    pub fn new(config: HostedStoreConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to construct hosted store HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn query_url(&self) -> Result<String> {
        let base = std::env::var(&self.config.url_env).map_err(|_| {
            AppError::message(format!(
                "Environment variable {} is not set",
                self.config.url_env
            ))
        })?;
        build_query_url(&base, &self.config)
    }
}

pub fn build_query_url(base: &str, config: &HostedStoreConfig) -> Result<String> {
    let base = base.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(AppError::message("Hosted store URL is empty"));
    }

    let replacements = HashMap::from([
        ("base", base.to_string()),
        ("table", config.table.clone()),
        ("column", config.column.clone()),
    ]);
    let mut url =
        request::render_template("{base}/rest/v1/{table}?select={column}", &replacements)?;

    if let Some(filter) = config.filter.as_deref().map(str::trim) {
        if !filter.is_empty() {
            url.push('&');
            url.push_str(filter.trim_start_matches('&'));
        }
    }

    Ok(url)
}

#[async_trait]
impl SymbolStore for RestSymbolStore {
    async fn fetch_symbols(&self) -> Result<Vec<String>> {
        let url = self.query_url()?;
        let headers = request::build_headers(&self.config.headers)?;

        let response = self.client.get(&url).headers(headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::message(format!(
                "Hosted store query on `{}` failed with status {status}",
                self.config.table
            )));
        }

        let body = response.text().await?;
        decode::parse_store_rows(&body, &self.config.column)
    }
}
