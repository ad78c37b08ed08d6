/*!
 * Cell text normalization
 *
 * This is the only place raw cell typing is inspected; everything past
 * here works on plain strings.
 */

use crate::data_types::Cell;

/// Render a cell as trimmed text. Empty cells give an empty string.
pub fn normalize(cell: &Cell) -> String {
    cell.as_text()
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Lower-case for case-insensitive comparison.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// First `n` characters of `text` (the whole string when shorter).
pub fn prefix(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Length in characters, not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
