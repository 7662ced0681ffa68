use std::collections::BTreeMap;

use super::snapshot::Snapshot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedRecords {
    pub prices: BTreeMap<String, f64>,
    pub industries: BTreeMap<String, String>,
}

impl MergedRecords {
    /// Symbols whose price came from the previous snapshot rather than this run.
    pub fn carried_forward(&self, fresh_prices: &BTreeMap<String, f64>) -> usize {
        self.prices
            .keys()
            .filter(|symbol| !fresh_prices.contains_key(*symbol))
            .count()
    }
}

/// Combine fresh results with the previous snapshot for the current universe.
///
/// For each symbol in `symbols`: the fresh value wins, otherwise the previous
/// value is carried forward, otherwise the symbol is left out. Prices and
/// industries are merged independently, and nothing outside `symbols` is kept.
pub fn merge<'a, I>(
    symbols: I,
    fresh_prices: &BTreeMap<String, f64>,
    fresh_industries: &BTreeMap<String, String>,
    previous: &Snapshot,
) -> MergedRecords
where
    I: IntoIterator<Item = &'a String>,
{
    let mut merged = MergedRecords::default();

    for symbol in symbols {
        if let Some(price) = fresh_prices
            .get(symbol)
            .or_else(|| previous.prices.get(symbol))
        {
            merged.prices.insert(symbol.clone(), *price);
        }

        if let Some(industry) = fresh_industries
            .get(symbol)
            .or_else(|| previous.industries.get(symbol))
        {
            merged.industries.insert(symbol.clone(), industry.clone());
        }
    }

    merged
}
