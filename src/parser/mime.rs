//! Recursive MIME parsing into a [`ParsedDocument`].
//!
//! Parsing happens in two steps. [`MimeParser::build_tree`] turns the raw
//! text into a [`MimeNode`] tree, splitting multipart bodies on their
//! boundary lines. [`MimeParser::parse`] then walks that tree depth-first
//! and merges the leaves into html, text and a flat attachment list.
//!
//! Nothing here fails: unparseable input becomes preformatted text, and an
//! unrecognised part is an empty leaf that does not disturb its siblings.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::model::attachment::Attachment;
use crate::model::document::ParsedDocument;
use crate::parser::decode;
use crate::parser::header::{self, StructuredValue};

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
pub const MAX_DEPTH: usize = 10;

/// Header fields of one part, plus its undecoded body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePart {
    /// Lowercased `type/subtype`; `text/plain` when the header is absent.
    pub content_type: String,
    pub charset: Option<String>,
    pub boundary: Option<String>,
    /// Lowercased Content-Transfer-Encoding.
    pub transfer_encoding: Option<String>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Lowercased disposition type (`inline`, `attachment`).
    pub disposition: Option<String>,
    pub filename: Option<String>,
    pub raw_body: String,
}

impl MessagePart {
    /// Extract the part fields from a header block and attach `body`.
    pub fn from_headers(header_block: &str, body: &str) -> Self {
        let headers = header::unfold_headers(header_block);

        let content_type = header::get_header(&headers, "content-type")
            .map(StructuredValue::parse)
            .unwrap_or_default();
        let disposition = header::get_header(&headers, "content-disposition")
            .map(StructuredValue::parse);

        // filename*= / name*= take precedence over their plain forms
        let filename = disposition
            .as_ref()
            .and_then(|d| d.raw_param("filename*").map(decode::decode_rfc2231))
            .or_else(|| content_type.raw_param("name*").map(decode::decode_rfc2231))
            .or_else(|| disposition.as_ref().and_then(|d| d.filename_param("filename")))
            .or_else(|| content_type.filename_param("name"))
            .filter(|f| !f.is_empty());

        let mime = if content_type.value.is_empty() {
            "text/plain".to_string()
        } else {
            content_type.value.clone()
        };

        Self {
            charset: content_type.param("charset").map(str::to_string),
            boundary: content_type
                .param("boundary")
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            transfer_encoding: header::get_header(&headers, "content-transfer-encoding")
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
            content_id: header::get_header(&headers, "content-id")
                .map(header::strip_angle_brackets)
                .filter(|cid| !cid.is_empty()),
            disposition: disposition
                .map(|d| d.value)
                .filter(|d| !d.is_empty()),
            content_type: mime,
            filename,
            raw_body: body.to_string(),
        }
    }

    fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/")
    }

    fn is_text_body(&self) -> bool {
        self.content_type == "text/html" || self.content_type == "text/plain"
    }

    /// A part is an attachment when it is marked as one, carries a file name,
    /// or is a non-text part with a Content-ID.
    fn is_attachment(&self) -> bool {
        self.disposition
            .as_deref()
            .is_some_and(|d| d.contains("attachment"))
            || self.filename.is_some()
            || (self.content_id.is_some() && !self.is_text_body())
    }
}

/// A node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    /// A multipart container and its parsed children.
    Multipart {
        boundary: String,
        children: Vec<MimeNode>,
    },
    /// A single part.
    Leaf(MessagePart),
    /// Input without a header/body separator, kept as text.
    Unparsed(String),
}

/// Content accumulated while walking the tree.
#[derive(Debug, Default)]
struct PartContent {
    html: String,
    styles: String,
    text: String,
    attachments: Vec<Attachment>,
}

impl PartContent {
    /// Merge a sibling: html, styles and text are last-non-empty-wins,
    /// attachments are concatenated in order.
    fn merge(&mut self, other: PartContent) {
        if !other.html.is_empty() {
            self.html = other.html;
        }
        if !other.styles.is_empty() {
            self.styles = other.styles;
        }
        if !other.text.is_empty() {
            self.text = other.text;
        }
        self.attachments.extend(other.attachments);
    }
}

/// Recursive-descent MIME parser.
#[derive(Debug, Clone, Copy)]
pub struct MimeParser {
    max_depth: usize,
}

impl Default for MimeParser {
    fn default() -> Self {
        Self::new(MAX_DEPTH)
    }
}

impl MimeParser {
    /// Create a parser that stops descending below `max_depth` nested multiparts.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Parse raw message bytes (UTF-8, or Windows-1252 when not valid UTF-8).
    pub fn parse_bytes(&self, raw: &[u8]) -> ParsedDocument {
        self.parse(&decode::decode_message_bytes(raw))
    }

    /// Parse a raw message into html, text and attachments.
    ///
    /// When the message yields neither html nor text, the whole input becomes
    /// the text body so the document is never empty.
    pub fn parse(&self, raw: &str) -> ParsedDocument {
        let tree = self.build_tree(raw);
        let root = walk(&tree);

        let html = match (root.html.is_empty(), root.styles.is_empty()) {
            (true, _) => String::new(),
            (false, true) => root.html,
            (false, false) => format!("{}\n{}", root.styles, root.html),
        };
        let text = if html.is_empty() && root.text.is_empty() {
            debug!("No renderable body found, falling back to raw message");
            raw.to_string()
        } else {
            root.text
        };

        ParsedDocument {
            html,
            text,
            attachments: root.attachments,
        }
    }

    /// Build the MIME tree of a message or sub-part.
    pub fn build_tree(&self, raw: &str) -> MimeNode {
        self.build_node(raw, 0)
    }

    fn build_node(&self, raw: &str, depth: usize) -> MimeNode {
        let Some((header_block, body)) = split_header_body(raw) else {
            return MimeNode::Unparsed(raw.to_string());
        };
        let part = MessagePart::from_headers(header_block, body);

        let boundary = match (&part.boundary, part.is_multipart()) {
            (Some(b), true) => b.clone(),
            _ => return MimeNode::Leaf(part),
        };
        if depth >= self.max_depth {
            warn!(depth, boundary = %boundary, "MIME nesting too deep, treating part as opaque");
            return MimeNode::Leaf(part);
        }

        let children = split_multipart(&part.raw_body, &boundary)
            .into_iter()
            .map(|segment| self.build_node(segment, depth + 1))
            .collect();

        MimeNode::Multipart { boundary, children }
    }
}

/// Parse a message with the default depth limit.
pub fn parse_message(raw: &str) -> ParsedDocument {
    MimeParser::default().parse(raw)
}

/// Depth-first walk producing the merged content of a node.
fn walk(node: &MimeNode) -> PartContent {
    match node {
        MimeNode::Multipart { children, .. } => {
            let mut merged = PartContent::default();
            for child in children {
                merged.merge(walk(child));
            }
            merged
        }
        MimeNode::Leaf(part) => walk_leaf(part),
        MimeNode::Unparsed(raw) => PartContent {
            text: raw.clone(),
            ..Default::default()
        },
    }
}

fn walk_leaf(part: &MessagePart) -> PartContent {
    if part.is_attachment() {
        let data = if part.transfer_encoding.as_deref() == Some("base64") {
            part.raw_body.chars().filter(|c| !c.is_whitespace()).collect()
        } else {
            part.raw_body.clone()
        };
        return PartContent {
            attachments: vec![Attachment::new(
                part.filename.clone(),
                part.content_id.clone(),
                Some(part.content_type.clone()),
                data,
                // an absent Content-Transfer-Encoding means 7bit
                Some(
                    part.transfer_encoding
                        .clone()
                        .unwrap_or_else(|| "7bit".to_string()),
                ),
            )],
            ..Default::default()
        };
    }

    match part.content_type.as_str() {
        "text/html" => {
            let decoded = decode::decode_body_with_charset(
                part.transfer_encoding.as_deref(),
                part.charset.as_deref(),
                &part.raw_body,
            );
            let (without_scripts, _) = extract_tag_blocks(&decoded, "script", true);
            let (html, styles) = extract_tag_blocks(&without_scripts, "style", false);
            PartContent {
                html: strip_active_attributes(&html),
                styles: styles.join("\n"),
                ..Default::default()
            }
        }
        "text/plain" => PartContent {
            text: decode::decode_body_with_charset(
                part.transfer_encoding.as_deref(),
                part.charset.as_deref(),
                &part.raw_body,
            ),
            ..Default::default()
        },
        other => {
            debug!(content_type = other, "Skipping part with no renderable content");
            PartContent::default()
        }
    }
}

/// Split at the first blank line into `(headers, body)`.
///
/// The body is trimmed of surrounding line breaks. Input starting with a line
/// break has an empty header block, and a header block ending in a line break
/// with nothing after it has an empty body. Returns `None` otherwise when
/// there is no blank line.
fn split_header_body(raw: &str) -> Option<(&str, &str)> {
    if let Some(rest) = raw.strip_prefix("\r\n").or_else(|| raw.strip_prefix('\n')) {
        return Some(("", trim_line_breaks(rest)));
    }

    let crlf = raw.find("\r\n\r\n").map(|pos| (pos, 4));
    let lf = raw.find("\n\n").map(|pos| (pos, 2));
    let (pos, len) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return header_only(raw).map(|headers| (headers, "")),
    };
    Some((&raw[..pos], trim_line_breaks(&raw[pos + len..])))
}

/// A header block with no body: it ends in a line break and every line is a
/// `Name: value` field or a folded continuation.
fn header_only(raw: &str) -> Option<&str> {
    let block = raw.strip_suffix('\n')?;
    let block = block.strip_suffix('\r').unwrap_or(block);

    let is_field = |line: &str| {
        line.split_once(':')
            .is_some_and(|(name, _)| !name.is_empty() && !name.contains(char::is_whitespace))
    };
    let mut lines = block.lines();
    if !lines.next().is_some_and(is_field) {
        return None;
    }
    lines
        .all(|line| line.starts_with([' ', '\t']) || is_field(line))
        .then_some(block)
}

fn trim_line_breaks(s: &str) -> &str {
    s.trim_matches(['\r', '\n'])
}

/// Split a multipart body into its part segments.
///
/// The preamble before the first `--boundary` line and the epilogue after
/// `--boundary--` are discarded. A missing terminal delimiter keeps the last
/// segment. Only the line break belonging to the next delimiter is removed
/// from a segment, so the blank line ending a header block survives.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let terminal = format!("--{boundary}--");

    let mut segments = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;
    let mut closed = false;

    for line in body.split_inclusive('\n') {
        let content = line.trim_end();
        if content == terminal {
            if let Some(start) = current.take() {
                segments.push(&body[start..offset]);
            }
            closed = true;
            break;
        }
        if content == delimiter {
            if let Some(start) = current.take() {
                segments.push(&body[start..offset]);
            }
            current = Some(offset + line.len());
        }
        offset += line.len();
    }
    if !closed {
        if let Some(start) = current {
            segments.push(&body[start..]);
        }
    }

    segments
        .into_iter()
        .map(strip_one_line_break)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn strip_one_line_break(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[a-zA-Z][^<>]*>").expect("valid tag pattern"));

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("valid event handler pattern")
});

static SCRIPT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\b(?:href|src|action|formaction)\s*=\s*["']?)\s*javascript:"#)
        .expect("valid script url pattern")
});

/// Drop `on*=` event handler attributes and neutralize `javascript:` URLs
/// inside tags. Text between tags is left alone.
fn strip_active_attributes(html: &str) -> String {
    TAG.replace_all(html, |caps: &Captures<'_>| {
        let tag = EVENT_HANDLER.replace_all(&caps[0], "");
        SCRIPT_URL.replace_all(&tag, "${1}#").into_owned()
    })
    .into_owned()
}

/// Remove every `<tag ...>...</tag>` block, returning the remaining markup and
/// the removed blocks. An unclosed block is dropped to the end of input when
/// `drop_unclosed` is set, and left in place otherwise.
fn extract_tag_blocks(html: &str, tag: &str, drop_unclosed: bool) -> (String, Vec<String>) {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut kept = String::with_capacity(html.len());
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        let after_name = start + open.len();
        let is_tag = matches!(
            lower.as_bytes().get(after_name),
            Some(b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n')
        );
        if !is_tag {
            kept.push_str(&html[pos..after_name]);
            pos = after_name;
            continue;
        }

        match lower[start..].find(&close) {
            Some(rel_end) => {
                let end = start + rel_end + close.len();
                kept.push_str(&html[pos..start]);
                blocks.push(html[start..end].to_string());
                pos = end;
            }
            None if drop_unclosed => {
                kept.push_str(&html[pos..start]);
                pos = html.len();
                break;
            }
            None => break,
        }
    }
    kept.push_str(&html[pos..]);
    (kept, blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_header_body_lf_and_crlf() {
        assert_eq!(
            split_header_body("A: 1\nB: 2\n\nBody\n"),
            Some(("A: 1\nB: 2", "Body"))
        );
        assert_eq!(
            split_header_body("A: 1\r\n\r\nBody\r\n"),
            Some(("A: 1", "Body"))
        );
        assert_eq!(split_header_body("\r\nonly body"), Some(("", "only body")));
        assert_eq!(split_header_body("no blank line here"), None);
    }

    #[test]
    fn test_header_block_without_body() {
        assert_eq!(
            split_header_body("A: 1\r\n  folded\r\nB: 2\r\n"),
            Some(("A: 1\r\n  folded\r\nB: 2", ""))
        );
        assert_eq!(split_header_body("plain text line\n"), None);
        assert_eq!(split_header_body("A: 1\nnot a header\n"), None);
    }

    #[test]
    fn test_split_multipart_keeps_blank_line_of_empty_part() {
        let body = "--X\r\nA: 1\r\n\r\n--X--\r\n";
        assert_eq!(split_multipart(body, "X"), vec!["A: 1\r\n"]);
    }

    #[test]
    fn test_strip_active_attributes() {
        let html = "<img src=x onerror=\"steal()\" alt='a'><a HREF=\"javascript:go()\" onClick='x'>one = two</a>";
        assert_eq!(
            strip_active_attributes(html),
            "<img src=x alt='a'><a HREF=\"#go()\">one = two</a>"
        );
        assert_eq!(strip_active_attributes("onload=1 <p>x</p>"), "onload=1 <p>x</p>");
    }

    #[test]
    fn test_split_multipart_discards_preamble_and_epilogue() {
        let body = "preamble\r\n--X\r\nA: 1\r\n\r\none\r\n--X\r\n\r\ntwo\r\n--X--\r\nepilogue";
        let segments = split_multipart(body, "X");
        assert_eq!(segments, vec!["A: 1\r\n\r\none", "\r\ntwo"]);
    }

    #[test]
    fn test_split_multipart_without_terminal() {
        let body = "--X\nA: 1\n\none\n--X\nA: 2\n\ntwo\n";
        assert_eq!(split_multipart(body, "X").len(), 2);
    }

    #[test]
    fn test_boundary_prefix_is_not_a_delimiter() {
        let body = "--X\n\none\n--XY\nstill one\n--X--\n";
        let segments = split_multipart(body, "X");
        assert_eq!(segments.len(), 1);
        assert!(segments[0].contains("still one"));
    }

    #[test]
    fn test_extract_style_blocks() {
        let html = "<STYLE type=\"text/css\">p{}</STYLE><p>x</p><style>b{}</style>";
        let (kept, styles) = extract_tag_blocks(html, "style", false);
        assert_eq!(kept, "<p>x</p>");
        assert_eq!(styles.len(), 2);
        assert!(styles[0].starts_with("<STYLE"));
    }

    #[test]
    fn test_extract_ignores_longer_tag_names() {
        let (kept, blocks) = extract_tag_blocks("<styles>x</styles>", "style", false);
        assert_eq!(kept, "<styles>x</styles>");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_unclosed_script_is_dropped() {
        let (kept, _) = extract_tag_blocks("ok<script>alert(1)", "script", true);
        assert_eq!(kept, "ok");
        let (kept, blocks) = extract_tag_blocks("ok<style>p{}", "style", false);
        assert_eq!(kept, "ok<style>p{}");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_missing_content_type_defaults_to_plain() {
        let part = MessagePart::from_headers("Subject: hi", "body");
        assert_eq!(part.content_type, "text/plain");
    }

    #[test]
    fn test_depth_limit_makes_part_opaque() {
        let raw = "Content-Type: multipart/mixed; boundary=\"A\"\n\n--A\nContent-Type: text/plain\n\ninner\n--A--\n";
        let tree = MimeParser::new(0).build_tree(raw);
        assert!(matches!(tree, MimeNode::Leaf(_)));
        // The opaque multipart yields nothing, so the raw message is shown.
        assert_eq!(MimeParser::new(0).parse(raw).text, raw);
    }
}
