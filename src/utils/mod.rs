pub mod file;
pub mod text;
pub mod time;

pub use file::write_atomic;
pub use text::normalize_symbol;
pub use time::{format_snapshot_timestamp, market_now, snapshot_timestamp};
