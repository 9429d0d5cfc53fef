//! The result of parsing a message: renderable body plus a flat attachment list.

use super::attachment::Attachment;

/// A parsed message, ready for rendering.
///
/// `html` is authoritative when non-empty; otherwise `text` is rendered as
/// preformatted text. Attachments keep the order in which they were found,
/// across nested parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ParsedDocument {
    /// HTML body with any extracted `<style>` blocks prepended.
    pub html: String,

    /// Plain-text body.
    pub text: String,

    /// All attachments, inline ones included.
    pub attachments: Vec<Attachment>,
}

impl ParsedDocument {
    /// HTML to display: the HTML body, or the text body as escaped `<pre>`.
    pub fn render_html(&self) -> String {
        if self.html.is_empty() {
            format!("<pre>{}</pre>", escape_html(&self.text))
        } else {
            self.html.clone()
        }
    }

    /// Attachments offered for download (everything without a Content-ID).
    pub fn downloadable(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| !a.is_inline())
    }
}

/// Escape `&`, `<`, `>` and `"` for embedding text in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefers_html() {
        let doc = ParsedDocument {
            html: "<p>hi</p>".into(),
            text: "hi".into(),
            attachments: Vec::new(),
        };
        assert_eq!(doc.render_html(), "<p>hi</p>");
    }

    #[test]
    fn test_render_text_is_escaped() {
        let doc = ParsedDocument {
            text: "a < b & c".into(),
            ..Default::default()
        };
        assert_eq!(doc.render_html(), "<pre>a &lt; b &amp; c</pre>");
    }
}
