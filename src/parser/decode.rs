//! Content-transfer decoding: base64, quoted-printable and RFC 2231 parameter values.
//!
//! Every function here is total. Malformed input never produces an error;
//! it degrades to a documented fallback so that a broken part cannot abort
//! the parse of its siblings.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::{debug, warn};

/// Base64 engine that tolerates missing padding and non-zero trailing bits,
/// both common in real-world mail.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode base64 to bytes.
///
/// All whitespace is stripped and the input is right-padded with `=` to a
/// multiple of four characters. Returns `None` if characters outside the
/// base64 alphabet remain.
pub fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    let mut compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let rem = compact.len() % 4;
    if rem != 0 {
        compact.extend(std::iter::repeat('=').take(4 - rem));
    }
    match LENIENT_BASE64.decode(compact.as_bytes()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!(error = %e, len = compact.len(), "Base64 decode failed");
            None
        }
    }
}

/// Encode bytes as standard, padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 and interpret the bytes as UTF-8 text (lossy).
///
/// If the input is not valid base64 the raw string is returned unmodified,
/// so the caller still has something readable to show.
pub fn decode_base64_to_text(raw: &str) -> String {
    match decode_base64(raw) {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => raw.to_string(),
    }
}

/// Decode quoted-printable text.
///
/// Soft line breaks (`=` followed by a line ending) are removed, then each
/// `=XX` escape is replaced by the character with that code point. Every
/// other character, including a stray `=`, is left untouched.
///
/// Known limitation: escapes are mapped one byte to one character, so a
/// multi-byte UTF-8 sequence split over several `=XX` escapes (e.g.
/// `=C3=A9`) comes out as two Latin-1 characters rather than `é`. Use
/// [`decode_quoted_printable_bytes`] when the exact bytes are needed.
pub fn decode_quoted_printable(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '=' {
            result.push(ch);
            continue;
        }
        // Soft line break
        match chars.peek() {
            Some('\n') => {
                chars.next();
                continue;
            }
            Some('\r') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                if lookahead.peek() == Some(&'\n') {
                    chars = lookahead;
                    chars.next();
                    continue;
                }
            }
            _ => {}
        }
        let mut lookahead = chars.clone();
        match (lookahead.next(), lookahead.next()) {
            (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                result.push(char::from((hex_val(hi as u8) << 4) | hex_val(lo as u8)));
                chars = lookahead;
            }
            _ => result.push('='),
        }
    }
    result
}

/// Decode quoted-printable into raw bytes (soft breaks removed, `=XX` resolved).
pub fn decode_quoted_printable_bytes(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }
        // Soft line break
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }
        match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                result.push((hex_val(hi) << 4) | hex_val(lo));
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }
    result
}

/// Decode a body according to its `Content-Transfer-Encoding`.
///
/// `base64` and `quoted-printable` are matched case-insensitively; any other
/// or absent encoding passes the body through unchanged.
pub fn decode_body(transfer_encoding: Option<&str>, raw: &str) -> String {
    decode_body_with_charset(transfer_encoding, None, raw)
}

/// Like [`decode_body`], but decodes base64 bytes with the part's charset.
pub fn decode_body_with_charset(
    transfer_encoding: Option<&str>,
    charset: Option<&str>,
    raw: &str,
) -> String {
    let encoding = transfer_encoding.map(|e| e.trim().to_ascii_lowercase());
    match encoding.as_deref() {
        Some("base64") => match decode_base64(raw) {
            Some(bytes) => decode_charset(charset.unwrap_or("utf-8"), &bytes),
            None => raw.to_string(),
        },
        Some("quoted-printable") => decode_quoted_printable(raw),
        _ => raw.to_string(),
    }
}

/// Decode an RFC 2231 extended parameter value.
///
/// `charset'lang'percent-escaped` is percent-decoded and interpreted in the
/// declared charset (UTF-8 when empty). A value not in that form has its
/// surrounding quotes stripped and is otherwise returned verbatim.
///
/// `decode_rfc2231("utf-8''file%20name.pdf")` → `"file name.pdf"`
pub fn decode_rfc2231(param: &str) -> String {
    let trimmed = strip_quotes(param.trim());
    if let Some((charset, rest)) = trimmed.split_once('\'') {
        if let Some((_lang, value)) = rest.split_once('\'') {
            if !value.is_empty() {
                let bytes = percent_decode(value);
                let charset = if charset.is_empty() { "utf-8" } else { charset };
                return decode_charset(charset, &bytes);
            }
        }
    }
    trimmed.to_string()
}

/// Decode raw message bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_message_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Decode bytes using a named charset.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.trim().to_lowercase();
    match charset_lower.as_str() {
        "" | "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset_lower.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// Strip one pair of surrounding double quotes.
pub(crate) fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// `%XX` → byte; a `%` not followed by two hex digits is kept literally.
fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1), bytes.get(i + 2)) {
            (b'%', Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                result.push((hex_val(hi) << 4) | hex_val(lo));
                i += 3;
            }
            (b, _, _) => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_val(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}
