use serde_json::Value;

use crate::error::AppError;

use super::{DailyBar, FetchResult, IndustryRow};

pub fn walk_json_path<'a>(root: &'a Value, path: &[String]) -> FetchResult<&'a Value> {
    let mut cursor = root;
    for key in path {
        cursor = cursor.get(key).ok_or_else(|| {
            AppError::message(format!("Missing key `{key}` while navigating JSON path"))
        })?;
    }
    Ok(cursor)
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numbers arrive either as JSON numbers or as numeric strings.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .or_else(|| value_to_f64(value).map(|f| f as i64))
}

/// Decode the classification listing: an array of objects found under `path`.
pub fn parse_industry_listing(
    body: &str,
    path: &[String],
    symbol_field: &str,
    industry_field: &str,
) -> FetchResult<Vec<IndustryRow>> {
    let root: Value = serde_json::from_str(body)?;

    if let Some(errors) = root.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let first = errors
                .first()
                .and_then(|err| err.get("message"))
                .map(value_to_string)
                .unwrap_or_default();
            return Err(AppError::message(format!(
                "Listing query returned errors: {first}"
            )));
        }
    }

    let rows = walk_json_path(&root, path)?
        .as_array()
        .ok_or_else(|| AppError::message("Listing payload is not an array"))?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(object) = row.as_object() else {
            continue;
        };
        let Some(symbol) = object.get(symbol_field).map(value_to_string) else {
            continue;
        };
        let Some(industry) = object.get(industry_field).map(value_to_string) else {
            continue;
        };
        if symbol.is_empty() || industry.is_empty() {
            continue;
        }
        entries.push(IndustryRow { symbol, industry });
    }

    Ok(entries)
}

/// Decode an OHLC chart payload into bars sorted oldest first.
///
/// The payload is an array of per-symbol objects holding parallel `t`
/// (unix seconds) and `c` (close) arrays.
pub fn parse_chart_bars(body: &str, symbol: &str) -> FetchResult<Vec<DailyBar>> {
    let root: Value = serde_json::from_str(body)?;

    let series = match &root {
        Value::Array(items) => items,
        other => other
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::message("Chart payload missing or invalid"))?,
    };

    let matching = series.iter().find(|item| {
        item.get("symbol")
            .map(value_to_string)
            .map(|s| s.eq_ignore_ascii_case(symbol))
            .unwrap_or(false)
    });

    // An untagged series is taken as the one requested; a tagged one must match.
    let entry = match matching {
        Some(entry) => entry,
        None => {
            let first = series.first().ok_or_else(|| {
                AppError::message(format!("No chart series returned for {symbol}"))
            })?;
            if let Some(other) = first.get("symbol") {
                return Err(AppError::message(format!(
                    "Chart series for {} returned when {symbol} was requested",
                    value_to_string(other)
                )));
            }
            first
        }
    };

    let times = entry
        .get("t")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::message(format!("Chart series for {symbol} has no `t` column")))?;
    let closes = entry
        .get("c")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::message(format!("Chart series for {symbol} has no `c` column")))?;

    let mut bars: Vec<DailyBar> = times
        .iter()
        .zip(closes.iter())
        .filter_map(|(time, close)| {
            Some(DailyBar {
                timestamp: value_to_i64(time)?,
                close: value_to_f64(close)?,
            })
        })
        .collect();

    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}

/// Decode hosted-store rows (`[{"<column>": "..."}, ...]`) into raw symbol strings.
pub fn parse_store_rows(body: &str, column: &str) -> FetchResult<Vec<String>> {
    let root: Value = serde_json::from_str(body)?;
    let rows = root
        .as_array()
        .ok_or_else(|| AppError::message("Hosted store response is not an array"))?;

    Ok(rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(value_to_string)
        .filter(|value| !value.is_empty())
        .collect())
}
