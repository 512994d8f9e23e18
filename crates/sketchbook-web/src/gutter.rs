#![forbid(unsafe_code)]

//! Gutter geometry.

/// Minimum highlight width in px.
pub const MIN_HIGHLIGHT: f64 = 70.0;
/// Gutter width the highlight starts from.
pub const GUTTER_WIDTH: f64 = 45.0;
/// Trailing padding after the last character.
pub const PADDING: f64 = 5.0;

/// Width of the current-line highlight for a line of `char_len` characters,
/// capped by the `available` text width.
#[must_use]
pub fn highlight_width(char_len: usize, char_width: f64, available: f64) -> f64 {
    let text = (char_len as f64 * char_width).min(available.max(0.0));
    (GUTTER_WIDTH + text + PADDING).max(MIN_HIGHLIGHT)
}

/// Gutter row classes for a line.
#[must_use]
pub fn row_class(kind_class: Option<&str>, current: bool) -> String {
    let mut class = String::from("line-number");
    if let Some(kind) = kind_class {
        class.push(' ');
        class.push_str(kind);
    }
    if current {
        class.push_str(" current-line");
    }
    class
}
