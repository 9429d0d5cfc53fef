//! Integration tests for MIME parsing, transfer decoding and inline image embedding.

use docpreview::parser::decode::{decode_base64_to_text, decode_rfc2231, encode_base64};
use docpreview::parser::embed::embed_images;
use docpreview::parser::mime::{parse_message, MimeNode, MimeParser};

// ─── Multipart with one text part and one attachment ────────────────

#[test]
fn test_text_part_and_base64_attachment() {
    let raw = "Content-Type: multipart/mixed; boundary=\"X\"\r\n\
               \r\n\
               --X\r\n\
               Content-Type: text/plain\r\n\
               \r\n\
               Hello World\r\n\
               --X\r\n\
               Content-Type: text/plain\r\n\
               Content-Disposition: attachment; filename=\"file.txt\"\r\n\
               Content-Transfer-Encoding: base64\r\n\
               \r\n\
               SGVsbG8=\r\n\
               --X--\r\n";

    let doc = parse_message(raw);
    assert!(
        doc.text.contains("Hello World") || doc.html.contains("Hello World"),
        "body should contain the text part, got text={:?} html={:?}",
        doc.text,
        doc.html
    );
    assert_eq!(doc.attachments.len(), 1);
    assert_eq!(doc.attachments[0].filename, "file.txt");
    assert_eq!(doc.attachments[0].to_blob().bytes, b"Hello".to_vec());
}

#[test]
fn test_empty_attachment_part_is_counted() {
    let raw = "Content-Type: multipart/mixed; boundary=\"X\"\r\n\
               \r\n\
               --X\r\n\
               Content-Type: text/plain\r\n\
               \r\n\
               Hello World\r\n\
               --X\r\n\
               Content-Type: text/plain\r\n\
               Content-Disposition: attachment; filename=\"empty.txt\"\r\n\
               \r\n\
               --X--\r\n";

    let doc = parse_message(raw);
    assert_eq!(doc.text, "Hello World");
    assert_eq!(doc.attachments.len(), 1);
    assert_eq!(doc.attachments[0].filename, "empty.txt");
    assert!(doc.attachments[0].to_blob().bytes.is_empty());
}

#[test]
fn test_attachment_without_transfer_encoding_is_kept_verbatim() {
    // "Test1234" is also valid base64, but without a header it is 7bit
    let raw = "Content-Type: multipart/mixed; boundary=\"X\"\n\
               \n\
               --X\n\
               Content-Type: text/csv\n\
               Content-Disposition: attachment; filename=\"a.csv\"\n\
               \n\
               Test1234\n\
               --X--\n";

    let doc = parse_message(raw);
    assert_eq!(doc.attachments.len(), 1);
    let blob = doc.attachments[0].to_blob();
    assert_eq!(blob.bytes, b"Test1234".to_vec());
    assert_eq!(blob.mime, "text/csv");
}

// ─── Inline image referenced by cid ─────────────────────────────────

#[test]
fn test_inline_image_is_embedded_and_hidden() {
    let raw = "Content-Type: multipart/related; boundary=\"rel\"\n\
               \n\
               --rel\n\
               Content-Type: text/html\n\
               \n\
               <img src=\"cid:img1\">\n\
               --rel\n\
               Content-Type: image/png\n\
               Content-ID: <img1>\n\
               Content-Transfer-Encoding: base64\n\
               \n\
               ZmFrZQ==\n\
               --rel--\n";

    let doc = parse_message(raw);
    let html = embed_images(&doc.html, &doc.attachments);
    assert!(html.contains("src=\"data:image/png;base64,ZmFrZQ==\""), "got {html}");
    assert_eq!(doc.attachments.len(), 1);
    assert_eq!(doc.downloadable().count(), 0);
}

// ─── Attachment count at any nesting depth ──────────────────────────

#[test]
fn test_attachment_count_across_nested_parts() {
    let raw = "Content-Type: multipart/mixed; boundary=\"outer\"\n\
               \n\
               This is the preamble.\n\
               --outer\n\
               Content-Type: multipart/alternative; boundary=\"inner\"\n\
               \n\
               --inner\n\
               Content-Type: text/plain\n\
               \n\
               plain body\n\
               --inner\n\
               Content-Type: text/html\n\
               \n\
               <p>html body</p>\n\
               --inner--\n\
               --outer\n\
               Content-Type: application/pdf; name=\"a.pdf\"\n\
               Content-Transfer-Encoding: base64\n\
               \n\
               JVBERg==\n\
               --outer\n\
               Content-Type: multipart/related; boundary=\"deep\"\n\
               \n\
               --deep\n\
               Content-Type: image/gif\n\
               Content-ID: <logo>\n\
               \n\
               R0lGODlh\n\
               --deep\n\
               Content-Type: application/zip\n\
               Content-Disposition: attachment\n\
               \n\
               UEsDBA==\n\
               --deep--\n\
               --outer--\n\
               epilogue text\n";

    let doc = parse_message(raw);
    let names: Vec<&str> = doc.attachments.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "logo", "unnamed"]);
    assert_eq!(doc.downloadable().count(), 2);
    assert_eq!(doc.text, "plain body");
    assert_eq!(doc.html, "<p>html body</p>");
    assert!(!doc.text.contains("preamble"));
    assert!(!doc.text.contains("epilogue"));
}

#[test]
fn test_tree_shape() {
    let raw = "Content-Type: multipart/mixed; boundary=b\n\n--b\n\nfirst\n--b\nContent-Type: text/html\n\n<b>x</b>\n--b--\n";
    match MimeParser::default().build_tree(raw) {
        MimeNode::Multipart { boundary, children } => {
            assert_eq!(boundary, "b");
            assert_eq!(children.len(), 2);
            assert!(matches!(&children[1], MimeNode::Leaf(p) if p.content_type == "text/html"));
        }
        other => panic!("expected multipart root, got {other:?}"),
    }
}

#[test]
fn test_depth_limit_keeps_parsing_total() {
    let mut raw = String::from("Content-Type: text/plain\n\nbottom");
    for i in 0..20 {
        raw = format!(
            "Content-Type: multipart/mixed; boundary=\"b{i}\"\n\n--b{i}\n{raw}\n--b{i}--\n"
        );
    }
    let doc = MimeParser::new(3).parse(&raw);
    assert!(doc.html.is_empty());
    assert!(doc.attachments.is_empty());
    assert!(!doc.text.is_empty());
}

// ─── Fallbacks ──────────────────────────────────────────────────────

#[test]
fn test_no_blank_line_becomes_text() {
    let doc = parse_message("just one line with <tags>");
    assert_eq!(doc.text, "just one line with <tags>");
    assert_eq!(doc.render_html(), "<pre>just one line with &lt;tags&gt;</pre>");
}

#[test]
fn test_empty_document_falls_back_to_raw_message() {
    let raw = "Content-Type: application/octet-stream\n\nAAAA";
    let doc = parse_message(raw);
    assert!(doc.html.is_empty());
    assert_eq!(doc.text, raw);
}

#[test]
fn test_malformed_base64_body_is_kept_readable() {
    let raw = "Content-Type: text/plain\nContent-Transfer-Encoding: base64\n\n%%% not base64 %%%";
    let doc = parse_message(raw);
    assert_eq!(doc.text, "%%% not base64 %%%");
}

#[test]
fn test_missing_content_type_defaults_to_plain_text() {
    let doc = parse_message("Subject: hi\n\nbody text");
    assert_eq!(doc.text, "body text");
    assert!(doc.attachments.is_empty());
}

// ─── HTML handling ──────────────────────────────────────────────────

#[test]
fn test_styles_hoisted_and_scripts_removed() {
    let raw = "Content-Type: text/html; charset=utf-8\n\n\
               <html><head><style>p { color: red; }</style>\
               <script>alert(1)</script></head>\
               <body><p>Hi</p><SCRIPT type=\"text/javascript\">steal()</SCRIPT></body></html>";
    let doc = parse_message(raw);
    assert!(doc.html.starts_with("<style>p { color: red; }</style>\n"));
    assert!(doc.html.contains("<p>Hi</p>"));
    assert!(!doc.html.to_lowercase().contains("<script"));
    assert!(!doc.html.contains("steal()"));
    assert_eq!(doc.html.matches("<style>").count(), 1);
}

#[test]
fn test_event_handlers_and_script_urls_removed() {
    let raw = "Content-Type: text/html\n\n\
               <img src=\"x.png\" onerror=\"steal()\"><a href=\"javascript:go()\">link</a>";
    let doc = parse_message(raw);
    assert!(!doc.html.contains("onerror"), "got {}", doc.html);
    assert!(!doc.html.to_lowercase().contains("javascript:"), "got {}", doc.html);
    assert!(doc.html.contains("<img src=\"x.png\">"));
    assert!(doc.html.contains(">link</a>"));
}

#[test]
fn test_quoted_printable_html() {
    let raw = "Content-Type: text/html\nContent-Transfer-Encoding: quoted-printable\n\n\
               <p style=3D\"margin:0\">long line =\nwrapped</p>";
    let doc = parse_message(raw);
    assert_eq!(doc.html, "<p style=\"margin:0\">long line wrapped</p>");
}

#[test]
fn test_base64_html_with_charset() {
    // "<p>caf\xe9</p>" in ISO-8859-1
    let body = encode_base64(b"<p>caf\xe9</p>");
    let raw = format!(
        "Content-Type: text/html; charset=iso-8859-1\nContent-Transfer-Encoding: base64\n\n{body}"
    );
    assert_eq!(parse_message(&raw).html, "<p>café</p>");
}

// ─── Filenames ──────────────────────────────────────────────────────

#[test]
fn test_rfc2231_filename_wins_over_plain() {
    let raw = "Content-Type: multipart/mixed; boundary=\"X\"\n\n\
               --X\n\
               Content-Type: application/pdf; name=\"plain.pdf\"\n\
               Content-Disposition: attachment; filename*=utf-8''file%20name.pdf\n\
               \n\
               JVBERg==\n\
               --X--\n";
    let doc = parse_message(raw);
    assert_eq!(doc.attachments[0].filename, "file name.pdf");
}

#[test]
fn test_rfc2231_decode() {
    assert_eq!(decode_rfc2231("utf-8''file%20name.pdf"), "file name.pdf");
    assert_eq!(decode_rfc2231("\"quoted.pdf\""), "quoted.pdf");
}

#[test]
fn test_base64_text_roundtrip() {
    for s in ["", "a", "hello world", "naïve café ✓", "日本語のテキスト"] {
        assert_eq!(decode_base64_to_text(&encode_base64(s.as_bytes())), s);
    }
}

#[test]
fn test_windows_1252_message_bytes() {
    let raw = b"Content-Type: text/plain\n\nGr\xfc\xdfe";
    let doc = MimeParser::default().parse_bytes(raw);
    assert_eq!(doc.text, "Grüße");
}
