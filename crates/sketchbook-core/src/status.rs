#![forbid(unsafe_code)]

//! Status bar values derived from the buffer: cursor position and size.

use core::fmt;

/// 1-based logical line and column of a char offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for CursorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ln {}, Col {}", self.line, self.column)
    }
}

/// Compute the cursor position for `offset` (in chars) within `text`.
///
/// Offsets past the end are treated as the end of the buffer.
#[must_use]
pub fn cursor_position(text: &str, offset: usize) -> CursorPosition {
    let mut pos = CursorPosition::default();
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            pos.line += 1;
            pos.column = 1;
        } else {
            pos.column += 1;
        }
    }
    pos
}

/// Human-readable byte size (`N bytes`, `x.y KB`, `x.y MB`).
#[must_use]
pub fn format_file_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Snapshot of the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusLine {
    pub cursor: CursorPosition,
    /// UTF-8 encoded size of the buffer.
    pub size_bytes: usize,
}

impl StatusLine {
    #[must_use]
    pub fn compute(text: &str, cursor_offset: usize) -> Self {
        Self {
            cursor: cursor_position(text, cursor_offset),
            size_bytes: text.len(),
        }
    }

    #[must_use]
    pub fn size_label(&self) -> String {
        format_file_size(self.size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_at_start_is_one_one() {
        assert_eq!(cursor_position("abc", 0), CursorPosition { line: 1, column: 1 });
    }

    #[test]
    fn cursor_after_newline_starts_new_line() {
        let text = "let a;\nlet b;";
        assert_eq!(cursor_position(text, 7), CursorPosition { line: 2, column: 1 });
        assert_eq!(cursor_position(text, 10), CursorPosition { line: 2, column: 4 });
    }

    #[test]
    fn cursor_past_end_clamps() {
        assert_eq!(cursor_position("ab\n", 99), CursorPosition { line: 2, column: 1 });
    }

    #[test]
    fn cursor_display_matches_status_bar() {
        let pos = CursorPosition { line: 12, column: 5 };
        assert_eq!(pos.to_string(), "Ln 12, Col 5");
    }

    #[test]
    fn file_size_thresholds() {
        assert_eq!(format_file_size(0), "0 bytes");
        assert_eq!(format_file_size(1023), "1023 bytes");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn size_counts_utf8_bytes() {
        let status = StatusLine::compute("é", 1);
        assert_eq!(status.size_bytes, 2);
        assert_eq!(status.size_label(), "2 bytes");
    }
}
