//! Inline image embedding: `cid:` references become `data:` URIs.

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::model::attachment::Attachment;

/// Replace every `cid:<contentId>` in `html` with a `data:` URI built from the
/// matching attachment.
///
/// Matching is case-insensitive and anchored at the end of the id, so the id
/// `img1` never rewrites part of `cid:img10`.
pub fn embed_images(html: &str, attachments: &[Attachment]) -> String {
    embed_images_limited(html, attachments, usize::MAX)
}

/// Like [`embed_images`], but skips attachments whose base64 payload is
/// longer than `max_inline_bytes`.
pub fn embed_images_limited(html: &str, attachments: &[Attachment], max_inline_bytes: usize) -> String {
    let mut out = html.to_string();

    for att in attachments {
        let Some(cid) = att.content_id.as_deref() else {
            continue;
        };
        let data = att.base64_data();
        if data.len() > max_inline_bytes {
            debug!(cid, size = data.len(), "Inline image too large to embed");
            continue;
        }

        let re = match cid_pattern(cid) {
            Ok(re) => re,
            Err(e) => {
                warn!(cid, error = %e, "Could not build cid pattern");
                continue;
            }
        };
        let uri = format!("data:{};base64,{}", att.content_type, data);
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                let end = caps.name("end").map_or("", |m| m.as_str());
                format!("{uri}{end}")
            })
            .into_owned();
    }

    out
}

/// `cid:<id>` followed by a character that cannot continue an id, or end of input.
fn cid_pattern(cid: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r#"(?i)cid:{}(?P<end>[\s"'()<>;,\\]|$)"#,
        regex::escape(cid)
    ))
}
