use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Context, Result};
use crate::utils::write_atomic;

use super::merge::MergedRecords;

/// The persisted document read by the static page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub updated_at: String,
    /// Number of symbols carrying a price.
    #[serde(default)]
    pub total_symbols: usize,
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub industries: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new(updated_at: impl Into<String>, merged: MergedRecords) -> Self {
        Self {
            updated_at: updated_at.into(),
            total_symbols: merged.prices.len(),
            prices: merged.prices,
            industries: merged.industries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.industries.is_empty()
    }

    /// Pretty JSON with two-space indentation; non-ASCII text is kept as-is.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read the previous snapshot; a missing or malformed file yields an empty one.
pub fn load_previous(path: &Path) -> Snapshot {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("No previous snapshot at {}", path.display());
            return Snapshot::default();
        }
        Err(err) => {
            warn!(
                "Previous snapshot {} unreadable, starting empty: {err}",
                path.display()
            );
            return Snapshot::default();
        }
    };

    match serde_json::from_str::<Snapshot>(&contents) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(
                "Previous snapshot {} is malformed, starting empty: {err}",
                path.display()
            );
            Snapshot::default()
        }
    }
}

/// Serialise and replace the snapshot file.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let mut json = snapshot.to_json()?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(())
}
