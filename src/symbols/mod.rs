use std::collections::BTreeSet;
use std::path::Path;

use log::{info, warn};

use crate::config::SymbolSourceConfig;
use crate::fetch::IndustryMap;
use crate::utils::normalize_symbol;

pub mod file;
pub mod hosted;

pub use file::load_symbol_file;
pub use hosted::{RestSymbolStore, SymbolStore};

/// Unique, uppercased symbols of one run, in sorted order.
pub type SymbolSet = BTreeSet<String>;

/// Resolve the run's symbol universe with the configured strategy.
///
/// Never fails: unavailable sources resolve to an empty set, which the
/// pipeline treats as fatal.
pub async fn resolve_symbols(
    source: &SymbolSourceConfig,
    industries: &IndustryMap,
    store: Option<&dyn SymbolStore>,
) -> SymbolSet {
    let symbols = match source {
        SymbolSourceConfig::Classification => industries.keys().cloned().collect(),
        SymbolSourceConfig::Hosted { fallback_file, .. } => {
            let hosted = match store {
                Some(store) => from_store(store).await,
                None => {
                    warn!("Hosted symbol store is not configured");
                    SymbolSet::new()
                }
            };

            if hosted.is_empty() {
                warn!(
                    "Hosted store gave no symbols, falling back to {}",
                    fallback_file.display()
                );
                from_file(fallback_file)
            } else {
                hosted
            }
        }
        SymbolSourceConfig::File { path } => from_file(path),
    };

    info!(
        "Resolved {} symbols from {} source",
        symbols.len(),
        source.label()
    );
    symbols
}

async fn from_store(store: &dyn SymbolStore) -> SymbolSet {
    match store.fetch_symbols().await {
        Ok(raw) => normalize_all(raw),
        Err(err) => {
            warn!("Hosted symbol store unavailable: {err}");
            SymbolSet::new()
        }
    }
}

fn from_file(path: &Path) -> SymbolSet {
    match load_symbol_file(path) {
        Ok(raw) => normalize_all(raw),
        Err(err) => {
            warn!("Static symbol file unavailable: {err}");
            SymbolSet::new()
        }
    }
}

/// Normalise raw values into a set, dropping anything that is not a symbol.
pub fn normalize_all<I>(raw: I) -> SymbolSet
where
    I: IntoIterator<Item = String>,
{
    let mut set = SymbolSet::new();
    let mut rejected = Vec::new();

    for value in raw {
        if value.trim().is_empty() {
            continue;
        }
        match normalize_symbol(&value) {
            Some(symbol) => {
                set.insert(symbol);
            }
            None => rejected.push(value),
        }
    }

    if !rejected.is_empty() {
        warn!(
            "Ignored {} invalid symbol entries: {}",
            rejected.len(),
            rejected.join(", ")
        );
    }

    set
}
