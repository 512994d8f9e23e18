#![forbid(unsafe_code)]

//! Per-line gutter metadata (blank / comment / current line).
//!
//! The annotator caches the last classification so that the host only touches
//! gutter elements that actually changed. A [`GutterUpdate::Rebuild`] is
//! produced only when the line count changes; otherwise a
//! [`GutterUpdate::Patch`] lists the changed rows, which keeps per-keystroke
//! work proportional to the edit instead of the buffer size.

use crate::formatter::LINE_COMMENT;

/// Presentational class of a logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Code,
    /// Whitespace-only.
    Blank,
    /// Trimmed form starts with `//`.
    Comment,
}

impl LineKind {
    /// CSS class applied to the gutter row, if any.
    #[must_use]
    pub const fn css_class(self) -> Option<&'static str> {
        match self {
            Self::Code => None,
            Self::Blank => Some("blank-line"),
            Self::Comment => Some("comment-line"),
        }
    }
}

/// Classify a single line.
#[must_use]
pub fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with(LINE_COMMENT) {
        LineKind::Comment
    } else {
        LineKind::Code
    }
}

/// Cached metadata for one gutter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineInfo {
    pub kind: LineKind,
    /// Length in chars, used by the host to size the row highlight.
    pub char_len: usize,
}

impl LineInfo {
    #[must_use]
    pub fn of(line: &str) -> Self {
        Self {
            kind: classify_line(line),
            char_len: line.chars().count(),
        }
    }
}

/// Changed gutter row (0-based index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowChange {
    pub index: usize,
    pub info: LineInfo,
    pub current: bool,
}

/// Instruction for the host's gutter renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GutterUpdate {
    /// Line count changed: drop all rows and render `lines` from scratch.
    Rebuild {
        lines: Vec<LineInfo>,
        /// 0-based index of the current line.
        current: usize,
    },
    /// Line count unchanged: update only the listed rows.
    Patch { rows: Vec<RowChange> },
}

impl GutterUpdate {
    /// `true` when applying the update would not change anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Patch { rows } if rows.is_empty())
    }
}

/// Incremental line annotator.
#[derive(Debug, Clone, Default)]
pub struct LineAnnotator {
    lines: Vec<LineInfo>,
    current: usize,
}

impl LineAnnotator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    /// 0-based current line.
    #[must_use]
    pub const fn current_line(&self) -> usize {
        self.current
    }

    /// Re-annotate `text` with the caret on `current_line` (0-based).
    pub fn update(&mut self, text: &str, current_line: usize) -> GutterUpdate {
        let fresh: Vec<LineInfo> = text.split('\n').map(LineInfo::of).collect();
        let current = current_line.min(fresh.len().saturating_sub(1));

        if fresh.len() != self.lines.len() {
            self.lines = fresh;
            self.current = current;
            return GutterUpdate::Rebuild {
                lines: self.lines.clone(),
                current,
            };
        }

        let previous = self.current;
        let mut rows = Vec::new();
        for (index, (old, new)) in self.lines.iter_mut().zip(fresh).enumerate() {
            let current_changed =
                (index == previous || index == current) && previous != current;
            if *old != new || current_changed {
                *old = new;
                rows.push(RowChange {
                    index,
                    info: new,
                    current: index == current,
                });
            }
        }
        self.current = current;
        GutterUpdate::Patch { rows }
    }

    /// Move the current-line highlight without re-reading the text.
    ///
    /// Returns `None` when the line did not change.
    pub fn set_current_line(&mut self, line: usize) -> Option<GutterUpdate> {
        let line = line.min(self.lines.len().saturating_sub(1));
        if line == self.current || self.lines.is_empty() {
            return None;
        }
        let previous = self.current;
        self.current = line;
        let rows = [previous, line]
            .into_iter()
            .filter_map(|index| {
                self.lines.get(index).map(|info| RowChange {
                    index,
                    info: *info,
                    current: index == line,
                })
            })
            .collect();
        Some(GutterUpdate::Patch { rows })
    }
}
