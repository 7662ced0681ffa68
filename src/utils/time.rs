use chrono::{DateTime, FixedOffset, Utc};

/// Offset of the market's civil time (UTC+7).
pub const MARKET_UTC_OFFSET_SECS: i32 = 7 * 3600;

pub fn market_offset() -> FixedOffset {
    FixedOffset::east_opt(MARKET_UTC_OFFSET_SECS).expect("UTC+7 is within chrono's offset range")
}

pub fn market_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&market_offset())
}

/// ISO-8601 seconds precision with an explicit offset, e.g. `2024-06-10T15:04:05+07:00`.
pub fn format_snapshot_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

pub fn snapshot_timestamp() -> String {
    format_snapshot_timestamp(&market_now())
}
