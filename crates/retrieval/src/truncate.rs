//! Token-budget truncation.

use ragloom_core::Tokenizer;

/// Keep the longest prefix of `items` whose cumulative token count does not
/// exceed `budget`.
///
/// `text` extracts the part of an item that is counted. Counting stops at
/// the first item that overflows; later, smaller items are not considered,
/// so the result is always a prefix.
pub fn truncate_by_token_budget<T, F>(
    items: Vec<T>,
    text: F,
    budget: usize,
    tokenizer: &dyn Tokenizer,
) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if budget == 0 {
        return Vec::new();
    }

    let mut used = 0usize;
    let mut keep = 0usize;
    for item in &items {
        used += tokenizer.count_tokens(text(item));
        if used > budget {
            break;
        }
        keep += 1;
    }

    let mut items = items;
    items.truncate(keep);
    items
}
