//! Attachment payloads.
//!
//! The payload is kept in its transfer encoding until it is consumed.
//! Decoding to bytes only happens when a blob is built for download or an
//! inline image is embedded.

use std::borrow::Cow;

use crate::model::handle::Blob;
use crate::parser::decode;

/// Fallback MIME type for attachments that do not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An attachment found in a message or returned by the mail converter.
///
/// An attachment with a `content_id` is *inline*: it is referenced from the
/// HTML body via `cid:` and is not listed for download.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    /// Display filename. Never empty: falls back to the content ID, then `"unnamed"`.
    pub filename: String,

    /// Content-ID without angle brackets, for inline attachments.
    pub content_id: Option<String>,

    /// MIME content type (e.g. `"image/png"`).
    pub content_type: String,

    /// Payload, still in its transfer encoding (usually base64).
    pub data: String,

    /// Lowercased Content-Transfer-Encoding, or `None` when unknown
    /// (converter output, where `data` is base64 or raw text).
    pub encoding: Option<String>,
}

impl Attachment {
    /// Build an attachment, applying the filename and content-type fallbacks.
    pub fn new(
        filename: Option<String>,
        content_id: Option<String>,
        content_type: Option<String>,
        data: String,
        encoding: Option<String>,
    ) -> Self {
        let content_id = content_id.filter(|cid| !cid.is_empty());
        let filename = filename
            .filter(|f| !f.is_empty())
            .or_else(|| content_id.clone())
            .unwrap_or_else(|| "unnamed".to_string());
        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        Self {
            filename,
            content_id,
            content_type,
            data,
            encoding,
        }
    }

    /// `true` if the attachment is referenced from the HTML body.
    pub fn is_inline(&self) -> bool {
        self.content_id.is_some()
    }

    /// `true` if `data` holds base64 text.
    pub fn is_base64(&self) -> bool {
        match self.encoding.as_deref() {
            Some("base64") => true,
            Some(_) => false,
            None => looks_like_base64(&self.data),
        }
    }

    /// The payload as base64, re-encoding it when it is stored in another form.
    pub fn base64_data(&self) -> Cow<'_, str> {
        if self.is_base64() {
            Cow::Borrowed(self.data.as_str())
        } else {
            Cow::Owned(decode::encode_base64(&self.to_blob().bytes))
        }
    }

    /// Decode the payload to bytes for download.
    ///
    /// A payload that is not base64, or that claims to be but fails to
    /// decode, is offered as its raw text.
    pub fn to_blob(&self) -> Blob {
        match self.encoding.as_deref() {
            Some("quoted-printable") => Blob::new(
                decode::decode_quoted_printable_bytes(&self.data),
                &self.content_type,
            ),
            Some("base64") | None => {
                let decoded = if self.is_base64() {
                    decode::decode_base64(&self.data)
                } else {
                    None
                };
                match decoded {
                    Some(bytes) => Blob::new(bytes, &self.content_type),
                    None => Blob::new(self.data.as_bytes().to_vec(), "text/plain"),
                }
            }
            Some(_) => Blob::new(self.data.as_bytes().to_vec(), &self.content_type),
        }
    }
}

/// Heuristic check for base64 text: alphabet characters (whitespace ignored)
/// followed by at most two `=`.
pub fn looks_like_base64(data: &str) -> bool {
    let compact: Vec<u8> = data.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let body_len = compact.len() - compact.iter().rev().take_while(|&&b| b == b'=').count();
    if body_len == 0 || compact.len() - body_len > 2 {
        return false;
    }
    compact[..body_len]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
}
