//! Format classification: declared content type and file name to a render category.

use std::fmt;

/// Generic binary content type.
pub const OCTET_STREAM: &str = "application/octet-stream";
/// OOXML word-processing document.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// Outlook message container.
pub const MSG_MIME: &str = "application/vnd.ms-outlook";
/// RFC 822 message.
pub const EML_MIME: &str = "message/rfc822";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff"];

/// Render category of a fetched file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Category {
    Image,
    Text,
    Pdf,
    Docx,
    Eml,
    Msg,
    /// Any other `application/vnd*` type.
    OfficeDoc,
    /// Unrecognized; carries the declared type verbatim.
    Other(String),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Text => f.write_str("text"),
            Self::Pdf => f.write_str("pdf"),
            Self::Docx => f.write_str("docx"),
            Self::Eml => f.write_str("eml"),
            Self::Msg => f.write_str("msg"),
            Self::OfficeDoc => f.write_str("office doc"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Map a declared content type to its category.
pub fn map_mime(declared: &str) -> Category {
    let mime = declared.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => Category::Pdf,
        EML_MIME => Category::Eml,
        MSG_MIME => Category::Msg,
        DOCX_MIME => Category::Docx,
        m if m.starts_with("image/") || m.starts_with("img/") => Category::Image,
        m if IMAGE_EXTENSIONS.contains(&m) => Category::Image,
        m if m.starts_with("text/") => Category::Text,
        m if m.starts_with("application/vnd") => Category::OfficeDoc,
        _ => Category::Other(declared.trim().to_string()),
    }
}

/// Guess a content type from a file name extension.
pub fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = extension(file_name)?;
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "docx" => DOCX_MIME,
        "txt" => "text/plain",
        "eml" => EML_MIME,
        "msg" => MSG_MIME,
        _ => return None,
    };
    Some(mime)
}

fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// A classified file: its category and the effective MIME type to render with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub category: Category,
    pub mime: String,
}

/// Classify a file from its declared content type and name.
///
/// The extension is consulted when the declared type is empty or generic
/// binary. A `.msg` or `.eml` name always wins over the declared type.
pub fn resolve(declared: &str, file_name: &str) -> Resolved {
    let declared = match declared.trim() {
        "" => OCTET_STREAM,
        d => d,
    };

    let mut mime = declared.to_string();
    let mut category = map_mime(declared);

    if declared.eq_ignore_ascii_case(OCTET_STREAM) {
        if let Some(guessed) = mime_from_extension(file_name) {
            mime = guessed.to_string();
            category = map_mime(guessed);
        }
    }

    match extension(file_name).as_deref() {
        Some("msg") => Resolved {
            category: Category::Msg,
            mime: MSG_MIME.to_string(),
        },
        Some("eml") => Resolved {
            category: Category::Eml,
            mime: EML_MIME.to_string(),
        },
        _ => Resolved { category, mime },
    }
}

/// Content type safe for handle creation: vendor types become generic binary.
pub fn handle_safe_mime(mime: &str) -> &str {
    if mime.to_ascii_lowercase().starts_with("application/vnd") {
        OCTET_STREAM
    } else {
        mime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_mime_table() {
        assert_eq!(map_mime("image/png"), Category::Image);
        assert_eq!(map_mime("img/jpeg"), Category::Image);
        assert_eq!(map_mime("gif"), Category::Image);
        assert_eq!(map_mime("application/pdf"), Category::Pdf);
        assert_eq!(map_mime("message/rfc822"), Category::Eml);
        assert_eq!(map_mime("application/vnd.ms-outlook"), Category::Msg);
        assert_eq!(map_mime(DOCX_MIME), Category::Docx);
        assert_eq!(map_mime("text/csv"), Category::Text);
        assert_eq!(map_mime("application/vnd.ms-excel"), Category::OfficeDoc);
        assert_eq!(
            map_mime("application/zip"),
            Category::Other("application/zip".to_string())
        );
    }

    #[test]
    fn test_octet_stream_uses_extension() {
        let r = resolve(OCTET_STREAM, "photo.GIF");
        assert_eq!(r.category, Category::Image);
        assert_eq!(r.mime, "image/gif");
    }

    #[test]
    fn test_empty_declared_type_uses_extension() {
        let r = resolve("", "notes.txt");
        assert_eq!(r.category, Category::Text);
        assert_eq!(r.mime, "text/plain");
    }

    #[test]
    fn test_declared_type_wins_over_extension() {
        let r = resolve("application/pdf", "scan.png");
        assert_eq!(r.category, Category::Pdf);
    }

    #[test]
    fn test_msg_and_eml_extension_are_authoritative() {
        assert_eq!(resolve("application/pdf", "mail.msg").category, Category::Msg);
        assert_eq!(resolve("text/plain", "Mail.EML").category, Category::Eml);
        assert_eq!(resolve(OCTET_STREAM, "x.msg").mime, MSG_MIME);
    }

    #[test]
    fn test_unknown_extension_stays_binary() {
        let r = resolve(OCTET_STREAM, "archive.7z");
        assert_eq!(r.category, Category::Other(OCTET_STREAM.to_string()));
        assert_eq!(r.mime, OCTET_STREAM);
    }

    #[test]
    fn test_handle_safe_mime() {
        assert_eq!(handle_safe_mime(DOCX_MIME), OCTET_STREAM);
        assert_eq!(handle_safe_mime("application/pdf"), "application/pdf");
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::OfficeDoc.to_string(), "office doc");
        assert_eq!(Category::Other("application/zip".into()).to_string(), "application/zip");
    }
}
