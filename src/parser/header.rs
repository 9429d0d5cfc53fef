//! MIME header parsing: folding, structured parameters and encoded-words (RFC 2047).

use crate::parser::decode::{self, decode_charset, strip_quotes};

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Get the first value for a header name (name must be lowercase).
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// A structured header value such as `text/html; charset="utf-8"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredValue {
    /// The value before the first `;`, lowercased and trimmed.
    pub value: String,
    /// Parameters as `(lowercase_name, raw_value)`; quotes are kept.
    pub params: Vec<(String, String)>,
}

impl StructuredValue {
    /// Split a header value at `;` separators that are not inside quotes.
    pub fn parse(raw: &str) -> Self {
        let mut pieces = split_unquoted(raw, ';').into_iter();
        let value = pieces.next().unwrap_or_default().trim().to_lowercase();

        let params = pieces
            .filter_map(|piece| {
                let (name, val) = piece.split_once('=')?;
                let name = name.trim().to_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, val.trim().to_string()))
            })
            .collect();

        Self { value, params }
    }

    /// Raw value of a parameter, quotes included.
    pub fn raw_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameter value with surrounding quotes removed.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.raw_param(name).map(strip_quotes)
    }

    /// Resolve a file name parameter.
    ///
    /// The RFC 2231 extended form `name*=` wins over the plain `name=`, whose
    /// value may carry RFC 2047 encoded-words.
    pub fn filename_param(&self, name: &str) -> Option<String> {
        if let Some(extended) = self.raw_param(&format!("{name}*")) {
            return Some(decode::decode_rfc2231(extended));
        }
        self.param(name).map(decode_encoded_words)
    }
}

/// Split on `sep` outside double quotes.
fn split_unquoted(raw: &str, sep: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c == sep && !in_quotes => {
                pieces.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    pieces.push(current);
    pieces
}

/// Extract content between `<` and `>` (for Content-ID), or the trimmed value.
pub fn strip_angle_brackets(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start + 1..start + end].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => decode::decode_base64(encoded_text)?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(DecodedWord {
        text: decode_charset(charset, &bytes),
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    decode::decode_quoted_printable_bytes(&input.replace('_', " "))
}
