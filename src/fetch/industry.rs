use std::collections::BTreeMap;

use log::{info, warn};

use crate::utils::normalize_symbol;

use super::MarketData;

pub type IndustryMap = BTreeMap<String, String>;

/// Fetch the symbol → industry map in one call. Failures degrade to an empty map.
pub async fn fetch_industry_map(market: &dyn MarketData) -> IndustryMap {
    let rows = match market.list_industries().await {
        Ok(rows) => rows,
        Err(err) => {
            warn!("Industry classification unavailable: {err}");
            return IndustryMap::new();
        }
    };

    let map: IndustryMap = rows
        .into_iter()
        .filter_map(|row| {
            let industry = row.industry.trim();
            if industry.is_empty() {
                return None;
            }
            normalize_symbol(&row.symbol).map(|symbol| (symbol, industry.to_string()))
        })
        .collect();

    if map.is_empty() {
        warn!("Industry classification returned no rows");
    } else {
        info!("{} symbols have an industry classification", map.len());
    }

    map
}
