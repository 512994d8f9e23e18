#![forbid(unsafe_code)]

//! Brace-counting re-indenter and line-comment toggle.
//!
//! Neither operation parses the source: braces inside strings or comments
//! count like any other brace. That is an accepted limitation of the
//! heuristic.

use crate::buffer::{Selection, byte_offset};

/// Marker recognised and inserted by [`toggle_comment`].
pub const LINE_COMMENT: &str = "//";

/// Formatter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Spaces per indent level; tabs expand to the same width.
    pub indent_width: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { indent_width: 2 }
    }
}

/// Result of a text transform: the new text plus a best-effort selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub text: String,
    pub selection: Selection,
}

/// Re-indent `text` by brace depth and collapse blank-line runs.
///
/// - `\r\n` becomes `\n`, tabs expand to `indent_width` spaces;
/// - every non-blank line is trimmed and re-indented at the current depth;
/// - a line starting with `}` dedents itself, a line ending with `{` indents
///   the following lines;
/// - two or more consecutive blank lines collapse to one.
///
/// Whitespace-only input is returned unchanged.
#[must_use]
pub fn format_code(text: &str, options: FormatOptions) -> String {
    if text.trim().is_empty() {
        return text.to_owned();
    }

    let tab = " ".repeat(options.indent_width);
    let normalized = text.replace("\r\n", "\n").replace('\t', &tab);

    let mut out: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut previous_blank = false;

    for line in normalized.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !previous_blank {
                out.push(String::new());
            }
            previous_blank = true;
            continue;
        }
        previous_blank = false;

        if trimmed.starts_with('}') {
            depth = depth.saturating_sub(1);
        }
        let mut formatted = " ".repeat(depth * options.indent_width);
        formatted.push_str(trimmed);
        out.push(formatted);

        if trimmed.ends_with('{') {
            depth += 1;
        }
    }

    out.join("\n")
}

/// Toggle `//` comments on every line touched by `selection`.
///
/// With a collapsed selection only the caret's line is affected. When every
/// non-blank line in range already starts with the marker, one marker (plus at
/// most one following space) is removed from each; otherwise `// ` is inserted
/// after the leading whitespace of each non-blank line. Blank lines are left
/// untouched.
#[must_use]
pub fn toggle_comment(text: &str, selection: Selection) -> TextEdit {
    let char_len = text.chars().count();
    let selection = selection.clamped(char_len);
    let start = byte_offset(text, selection.start);
    let end = byte_offset(text, selection.end);

    let range_start = text[..start].rfind('\n').map_or(0, |idx| idx + 1);
    // A selection ending right after a newline does not pull in the next line.
    let search_from = if selection.is_collapsed() {
        start
    } else {
        let last = text[..end].chars().next_back().map_or(0, char::len_utf8);
        end - last
    };
    let range_end = text[search_from..]
        .find('\n')
        .map_or(text.len(), |idx| search_from + idx);

    let block = &text[range_start..range_end];
    let lines: Vec<&str> = block.split('\n').collect();

    let mut non_blank = lines.iter().filter(|line| !line.trim().is_empty()).peekable();
    let all_commented = non_blank.peek().is_some()
        && non_blank.all(|line| line.trim_start().starts_with(LINE_COMMENT));

    let rewritten: Vec<String> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                return (*line).to_owned();
            }
            let indent_len = line.len() - line.trim_start().len();
            let (indent, body) = line.split_at(indent_len);
            if all_commented {
                let rest = body.strip_prefix(LINE_COMMENT).unwrap_or(body);
                let rest = rest.strip_prefix(' ').unwrap_or(rest);
                format!("{indent}{rest}")
            } else {
                format!("{indent}{LINE_COMMENT} {body}")
            }
        })
        .collect();
    let replacement = rewritten.join("\n");

    let mut new_text = String::with_capacity(text.len() + replacement.len() - block.len());
    new_text.push_str(&text[..range_start]);
    new_text.push_str(&replacement);
    new_text.push_str(&text[range_end..]);

    let old_chars = block.chars().count();
    let new_chars = replacement.chars().count();
    let new_len = new_text.chars().count();
    let new_end = (selection.end + new_chars).saturating_sub(old_chars);
    let selection = Selection::new(selection.start, new_end.max(selection.start)).clamped(new_len);

    TextEdit {
        text: new_text,
        selection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(text: &str) -> String {
        format_code(text, FormatOptions::default())
    }

    #[test]
    fn reindents_nested_blocks() {
        let input = "function setup() {\ncreateCanvas(400, 400);\nif (x) {\ny();\n}\n}";
        let expected =
            "function setup() {\n  createCanvas(400, 400);\n  if (x) {\n    y();\n  }\n}";
        assert_eq!(fmt(input), expected);
    }

    #[test]
    fn closing_brace_dedents_its_own_line() {
        assert_eq!(fmt("a {\n    } else {\nb\n}"), "a {\n} else {\n  b\n}");
    }

    #[test]
    fn normalizes_crlf_and_tabs() {
        assert_eq!(fmt("a {\r\n\tb;\r\n}"), "a {\n  b;\n}");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(fmt("a\n\n\n\nb\n  \n\t\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn depth_never_goes_negative() {
        assert_eq!(fmt("}\n}\nx"), "}\n}\nx");
    }

    #[test]
    fn blank_input_is_unchanged() {
        assert_eq!(fmt("  \n\t"), "  \n\t");
    }

    #[test]
    fn brace_inside_string_still_counts() {
        // Accepted limitation: the heuristic does not parse strings.
        assert_eq!(fmt("let s = \"{\nx"), "let s = \"{\n  x");
    }

    #[test]
    fn custom_indent_width() {
        let out = format_code("a {\nb\n}", FormatOptions { indent_width: 4 });
        assert_eq!(out, "a {\n    b\n}");
    }

    #[test]
    fn format_is_idempotent_on_sample() {
        let once = fmt("x {\n\n\n\ty {\nz\n  }\n}\n\n");
        assert_eq!(fmt(&once), once);
    }

    #[test]
    fn comment_current_line() {
        let edit = toggle_comment("a\n  b\nc", Selection::caret(3));
        assert_eq!(edit.text, "a\n  // b\nc");
    }

    #[test]
    fn uncomment_current_line() {
        let edit = toggle_comment("a\n  // b\nc", Selection::caret(4));
        assert_eq!(edit.text, "a\n  b\nc");
    }

    #[test]
    fn uncomment_removes_at_most_one_space() {
        let edit = toggle_comment("//   x", Selection::caret(0));
        assert_eq!(edit.text, "  x");
    }

    #[test]
    fn mixed_range_is_commented() {
        let text = "// a\nb";
        let edit = toggle_comment(text, Selection::new(0, text.chars().count()));
        assert_eq!(edit.text, "// // a\n// b");
    }

    #[test]
    fn blank_lines_are_untouched() {
        let text = "a\n\nb";
        let edit = toggle_comment(text, Selection::new(0, 4));
        assert_eq!(edit.text, "// a\n\n// b");
    }

    #[test]
    fn selection_ending_at_line_start_excludes_next_line() {
        let text = "a\nb\nc";
        // Select "a\n": the caret sits at the start of line 2.
        let edit = toggle_comment(text, Selection::new(0, 2));
        assert_eq!(edit.text, "// a\nb\nc");
    }

    #[test]
    fn selection_grows_with_inserted_markers() {
        let text = "a\nb";
        let edit = toggle_comment(text, Selection::new(0, 3));
        assert_eq!(edit.text, "// a\n// b");
        assert_eq!(edit.selection, Selection::new(0, 9));
    }

    #[test]
    fn toggle_twice_restores_text() {
        let text = "function draw() {\n  background(0);\n\n  circle(1, 2, 3);\n}";
        let all = Selection::new(0, text.chars().count());
        let once = toggle_comment(text, all);
        let twice = toggle_comment(&once.text, once.selection);
        assert_eq!(twice.text, text);
    }

    #[test]
    fn whitespace_only_range_is_unchanged() {
        let edit = toggle_comment("a\n   \nb", Selection::caret(3));
        assert_eq!(edit.text, "a\n   \nb");
    }

    #[test]
    fn empty_text_is_unchanged() {
        let edit = toggle_comment("", Selection::caret(0));
        assert_eq!(edit.text, "");
        assert_eq!(edit.selection, Selection::caret(0));
    }
}
