//! Small text helpers shared by ingestion and query code.

/// Trim surrounding whitespace and drop NUL bytes.
pub fn clean_text(text: &str) -> String {
    text.trim().replace('\0', "")
}

/// Trimmed content, cut to `max_chars` characters with a trailing `...`.
pub fn content_summary(content: &str, max_chars: usize) -> String {
    let content = content.trim();
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
