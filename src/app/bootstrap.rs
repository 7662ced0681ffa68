use std::sync::Arc;

use crate::config::{validate_config, Config, SymbolSourceConfig};
use crate::error::Result;
use crate::fetch::{MarketData, VciClient};
use crate::symbols::{RestSymbolStore, SymbolStore};

use super::pipeline::{Pipeline, RunSummary};

/// Entry point used by `main`: wire the real provider and store, then run once.
pub async fn run(config: Config) -> Result<RunSummary> {
    validate_config(&config)?;

    let market: Arc<dyn MarketData> = Arc::new(VciClient::new(config.provider.clone())?);

    let store: Option<Arc<dyn SymbolStore>> = match &config.source {
        SymbolSourceConfig::Hosted { store, .. } => Some(Arc::new(RestSymbolStore::new(
            store.clone(),
            config.provider.request_timeout,
        )?)),
        _ => None,
    };

    Pipeline::new(config, market, store).run().await
}
