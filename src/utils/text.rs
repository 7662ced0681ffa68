/// Longest identifier accepted as a ticker symbol.
pub const MAX_SYMBOL_LEN: usize = 16;

/// Trim and uppercase a raw ticker; `None` unless the result is a short ASCII alphanumeric code.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_SYMBOL_LEN
        || !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric())
    {
        return None;
    }

    Some(trimmed.to_ascii_uppercase())
}
