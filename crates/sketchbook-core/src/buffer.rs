#![forbid(unsafe_code)]

//! Mirror of the editor surface's text buffer.
//!
//! Offsets are measured in Unicode scalar values (`char`s). The DOM reports
//! selection offsets in UTF-16 code units; [`char_offset_from_utf16`] and
//! [`utf16_offset_from_char`] convert at the boundary.

/// Ordered selection range (`start <= end`) in char offsets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// Create a selection, swapping the ends if given backwards.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Collapsed selection (caret) at `offset`.
    #[must_use]
    pub const fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    #[must_use]
    pub const fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Clamp both ends into `0..=len`.
    #[must_use]
    pub fn clamped(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

/// Scroll offset and selection captured when the editor is hidden.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditorSnapshot {
    pub scroll_top: i32,
    pub selection: Selection,
}

/// Plain-text source buffer with selection and scroll state.
///
/// Invariant: `selection` always lies within `0..=char_len()`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buffer {
    text: String,
    char_len: usize,
    selection: Selection,
    scroll_top: i32,
}

impl Buffer {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_len = text.chars().count();
        Self {
            text,
            char_len,
            selection: Selection::default(),
            scroll_top: 0,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn char_len(&self) -> usize {
        self.char_len
    }

    #[must_use]
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    #[must_use]
    pub const fn scroll_top(&self) -> i32 {
        self.scroll_top
    }

    /// `true` when the buffer holds only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Replace the text, clamping the current selection into the new length.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.char_len = self.text.chars().count();
        self.selection = self.selection.clamped(self.char_len);
    }

    /// Replace text and selection together (the shape of a DOM `input` event).
    pub fn replace(&mut self, text: impl Into<String>, selection: Selection) {
        self.set_text(text);
        self.set_selection(selection);
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamped(self.char_len);
    }

    pub fn set_scroll_top(&mut self, scroll_top: i32) {
        self.scroll_top = scroll_top.max(0);
    }

    #[must_use]
    pub const fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            scroll_top: self.scroll_top,
            selection: self.selection,
        }
    }

    pub fn restore(&mut self, snapshot: EditorSnapshot) {
        self.set_scroll_top(snapshot.scroll_top);
        self.set_selection(snapshot.selection);
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.char_len = 0;
        self.selection = Selection::default();
        self.scroll_top = 0;
    }
}

/// Byte index of the `chars`-th char in `text` (saturating at `text.len()`).
#[must_use]
pub fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx)
}

/// Convert a DOM (UTF-16) offset into a char offset.
///
/// An offset that lands inside a surrogate pair rounds down to the start of
/// that char.
#[must_use]
pub fn char_offset_from_utf16(text: &str, units: usize) -> usize {
    let mut seen = 0usize;
    for (chars, ch) in text.chars().enumerate() {
        let next = seen + ch.len_utf16();
        if next > units {
            return chars;
        }
        seen = next;
    }
    text.chars().count()
}

/// Convert a char offset into a DOM (UTF-16) offset.
#[must_use]
pub fn utf16_offset_from_char(text: &str, chars: usize) -> usize {
    text.chars().take(chars).map(char::len_utf16).sum()
}
