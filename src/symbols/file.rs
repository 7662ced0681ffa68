use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Context, Result};

#[derive(Debug, Deserialize)]
struct SymbolFile {
    symbols: Vec<String>,
}

/// Read a static symbol list.
///
/// `.json` files must hold `{"symbols": [...]}`; anything else is read as a
/// plain list, one symbol per line (first CSV column), with blank lines and
/// `#` comments skipped. Values are returned raw; normalisation happens in
/// the resolver.
pub fn load_symbol_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read symbol file {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let parsed: SymbolFile = serde_json::from_str(&contents).map_err(|err| {
            AppError::message(format!(
                "failed to parse symbol file {}: {err}",
                path.display()
            ))
        })?;
        return Ok(parsed.symbols);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(contents.as_bytes());

    let mut codes = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(code) = record.get(0).map(str::trim) {
            if !code.is_empty() {
                codes.push(code.to_string());
            }
        }
    }

    Ok(codes)
}
