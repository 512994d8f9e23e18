#![forbid(unsafe_code)]

//! Preview document template and source injection.
//!
//! The clean preview document must contain exactly one
//! `<script id="sketch-source">…</script>` block. Each run replaces that
//! block's content with `window.SKETCH_SOURCE_CODE = `…`;` built from the
//! current buffer, on a fresh copy of the captured HTML.

use core::fmt;

/// `id` of the script element whose content is replaced on every run.
pub const SOURCE_MARKER_ID: &str = "sketch-source";
/// Body attribute naming the stored sketch script.
pub const SKETCH_JS_PATH_ATTR: &str = "data-sketch-js-path";
/// Global the injected script assigns.
pub const SOURCE_GLOBAL: &str = "window.SKETCH_SOURCE_CODE";

/// The template violates the injection contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// No `<script id="sketch-source">` element.
    MarkerMissing,
    /// More than one element carries the marker id.
    MarkerAmbiguous { count: usize },
    /// The marker element has no closing `</script>`.
    UnterminatedMarker,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkerMissing => write!(
                f,
                "template has no <script id=\"{SOURCE_MARKER_ID}\"> block to replace"
            ),
            Self::MarkerAmbiguous { count } => write!(
                f,
                "template has {count} <script id=\"{SOURCE_MARKER_ID}\"> blocks, \
                 expected exactly one"
            ),
            Self::UnterminatedMarker => {
                write!(f, "<script id=\"{SOURCE_MARKER_ID}\"> block is not closed")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Byte span of the marker block: `open_end..close_start` is the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MarkerSpan {
    open_end: usize,
    close_start: usize,
}

/// Captured, never-mutated preview document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTemplate {
    html: String,
}

impl PreviewTemplate {
    #[must_use]
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.html.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Path of the stored sketch script, from `data-sketch-js-path`.
    #[must_use]
    pub fn sketch_js_path(&self) -> Option<&str> {
        attribute_value(&self.html, SKETCH_JS_PATH_ATTR).filter(|path| !path.is_empty())
    }

    /// Check the injection contract without rendering.
    pub fn validate(&self) -> Result<(), TemplateError> {
        locate_marker(&self.html).map(|_| ())
    }

    /// Render a fresh document with `source` injected.
    pub fn render(&self, source: &str) -> Result<String, TemplateError> {
        let span = locate_marker(&self.html)?;
        let script = injection_script(source);
        let mut doc = String::with_capacity(self.html.len() + script.len());
        doc.push_str(&self.html[..span.open_end]);
        doc.push_str(&script);
        doc.push_str(&self.html[span.close_start..]);
        Ok(doc)
    }
}

/// `window.SKETCH_SOURCE_CODE = `…`;` for `source`.
#[must_use]
pub fn injection_script(source: &str) -> String {
    format!("{SOURCE_GLOBAL} = `{}`;", escape_template_literal(source))
}

/// Escape `source` for a JS template literal inside an HTML `<script>`.
///
/// `\`, `` ` `` and `$` are backslash-escaped so the literal evaluates back to
/// the exact source. `</` and `<!--` are broken up so the HTML parser cannot
/// end the script element early.
#[must_use]
pub fn escape_template_literal(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 8);
    let mut rest = source;
    while let Some(ch) = rest.chars().next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            '<' if rest.starts_with("</") => {
                out.push_str("<\\/");
                rest = &rest[2..];
                continue;
            }
            '<' if rest.starts_with("<!--") => {
                out.push_str("<\\!--");
                rest = &rest[4..];
                continue;
            }
            other => out.push(other),
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn locate_marker(html: &str) -> Result<MarkerSpan, TemplateError> {
    let mut found: Option<MarkerSpan> = None;
    let mut count = 0usize;
    let mut cursor = 0usize;

    while let Some(rel) = find_ascii_ci(&html[cursor..], "<script") {
        let tag_start = cursor + rel;
        let Some(tag_len) = html[tag_start..].find('>') else {
            break;
        };
        let open_end = tag_start + tag_len + 1;
        let tag = &html[tag_start..open_end];
        let close_start =
            find_ascii_ci(&html[open_end..], "</script").map(|rel| open_end + rel);

        if attribute_value(tag, "id") == Some(SOURCE_MARKER_ID) {
            count += 1;
            let Some(close_start) = close_start else {
                return Err(TemplateError::UnterminatedMarker);
            };
            if found.is_none() {
                found = Some(MarkerSpan {
                    open_end,
                    close_start,
                });
            }
        }

        cursor = close_start.unwrap_or(open_end);
        if cursor >= html.len() {
            break;
        }
        // Skip past "</script" so the next search starts after this element.
        if close_start.is_some() {
            cursor += "</script".len();
        }
    }

    match (found, count) {
        (Some(span), 1) => Ok(span),
        (Some(_), count) => Err(TemplateError::MarkerAmbiguous { count }),
        (None, _) => Err(TemplateError::MarkerMissing),
    }
}

/// First quoted value of `name="…"` / `name='…'` in `html`.
fn attribute_value<'a>(html: &'a str, name: &str) -> Option<&'a str> {
    let mut cursor = 0usize;
    while let Some(rel) = html[cursor..].find(name) {
        let start = cursor + rel;
        cursor = start + name.len();

        // Must be a whole attribute name, not the tail of a longer one.
        let preceded_ok = html[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_ascii_whitespace() || c == '<');
        if !preceded_ok {
            continue;
        }

        let after = html[cursor..].trim_start();
        let Some(after_eq) = after.strip_prefix('=') else {
            continue;
        };
        let after_eq = after_eq.trim_start();
        let mut chars = after_eq.chars();
        let Some(quote) = chars.next().filter(|q| *q == '"' || *q == '\'') else {
            continue;
        };
        let value = &after_eq[1..];
        return value.find(quote).map(|end| &value[..end]);
    }
    None
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = concat!(
        "<!doctype html><html><head><script src=\"/p5.js\"></script></head>",
        "<body data-sketch-js-path=\"/api/sketches/luis/snake\">",
        "<script id=\"sketch-source\">OLD</script>",
        "<script src=\"/runner.js\"></script></body></html>"
    );

    fn injected_content(doc: &str) -> &str {
        let open = "<script id=\"sketch-source\">";
        let start = doc.find(open).unwrap() + open.len();
        let end = start + doc[start..].find("</script>").unwrap();
        &doc[start..end]
    }

    #[test]
    fn injects_plain_source() {
        let tpl = PreviewTemplate::new(TEMPLATE);
        let doc = tpl.render("const x = 1;").unwrap();
        assert_eq!(injected_content(&doc), "window.SKETCH_SOURCE_CODE = `const x = 1;`;");
        assert!(doc.starts_with("<!doctype html><html><head><script src=\"/p5.js\"></script>"));
        assert!(doc.ends_with("<script src=\"/runner.js\"></script></body></html>"));
    }

    #[test]
    fn escapes_backticks_and_dollars() {
        let tpl = PreviewTemplate::new(TEMPLATE);
        let doc = tpl.render("let s = `${a}`;").unwrap();
        assert_eq!(
            injected_content(&doc),
            "window.SKETCH_SOURCE_CODE = `let s = \\`\\${a}\\`;`;"
        );
    }

    #[test]
    fn escapes_backslashes_and_script_breakouts() {
        assert_eq!(escape_template_literal("a\\nb"), "a\\\\nb");
        assert_eq!(escape_template_literal("'</script>'"), "'<\\/script>'");
        assert_eq!(escape_template_literal("<!-- x"), "<\\!-- x");
        assert_eq!(escape_template_literal("a < b"), "a < b");
    }

    #[test]
    fn escape_keeps_multibyte_text() {
        assert_eq!(escape_template_literal("¡hola ✓!"), "¡hola ✓!");
    }

    #[test]
    fn template_is_not_mutated_by_render() {
        let tpl = PreviewTemplate::new(TEMPLATE);
        let _ = tpl.render("a").unwrap();
        let second = tpl.render("b").unwrap();
        assert_eq!(injected_content(&second), "window.SKETCH_SOURCE_CODE = `b`;");
        assert_eq!(tpl.html(), TEMPLATE);
    }

    #[test]
    fn missing_marker_is_contract_violation() {
        let tpl = PreviewTemplate::new("<html><body><script>x</script></body></html>");
        assert_eq!(tpl.render("a"), Err(TemplateError::MarkerMissing));
    }

    #[test]
    fn duplicate_marker_is_rejected() {
        let html = "<script id=\"sketch-source\"></script><script id='sketch-source'></script>";
        let tpl = PreviewTemplate::new(html);
        assert_eq!(tpl.validate(), Err(TemplateError::MarkerAmbiguous { count: 2 }));
    }

    #[test]
    fn unterminated_marker_is_rejected() {
        let tpl = PreviewTemplate::new("<body><script id=\"sketch-source\">x");
        assert_eq!(tpl.validate(), Err(TemplateError::UnterminatedMarker));
    }

    #[test]
    fn marker_with_extra_attributes_and_single_quotes() {
        let html = "<body><SCRIPT type='text/javascript' id='sketch-source'>old</SCRIPT></body>";
        let doc = PreviewTemplate::new(html).render("x").unwrap();
        assert_eq!(
            doc,
            concat!(
                "<body><SCRIPT type='text/javascript' id='sketch-source'>",
                "window.SKETCH_SOURCE_CODE = `x`;</SCRIPT></body>"
            )
        );
    }

    #[test]
    fn similar_ids_do_not_match() {
        let html = concat!(
            "<script data-id=\"sketch-source\"></script>",
            "<script id=\"sketch-source-2\"></script>"
        );
        assert_eq!(PreviewTemplate::new(html).validate(), Err(TemplateError::MarkerMissing));
    }

    #[test]
    fn reads_sketch_js_path() {
        let tpl = PreviewTemplate::new(TEMPLATE);
        assert_eq!(tpl.sketch_js_path(), Some("/api/sketches/luis/snake"));
        assert_eq!(PreviewTemplate::new("<body>").sketch_js_path(), None);
        assert_eq!(
            PreviewTemplate::new("<body data-sketch-js-path=\"\">").sketch_js_path(),
            None
        );
    }
}
