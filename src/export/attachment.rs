//! Save attachments of a preview to disk.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::model::attachment::Attachment;
use crate::model::document::ParsedDocument;
use crate::model::handle::Blob;
use crate::model::preview::AttachmentLink;
use crate::preview::handles::HandleStore;

/// Write `blob` as `filename` inside `output_dir`, never overwriting.
pub fn export_blob(blob: &Blob, filename: &str, output_dir: &Path) -> anyhow::Result<PathBuf> {
    let filename = sanitize_filename_part(filename, 150);
    let path = unique_path(&output_dir.join(&filename));
    std::fs::write(&path, &blob.bytes)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(path)
}

/// Export the content behind an attachment link.
pub fn export_attachment(
    store: &dyn HandleStore,
    link: &AttachmentLink,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let blob = store
        .resolve(&link.url)
        .with_context(|| format!("Handle for '{}' has been revoked", link.name))?;
    export_blob(&blob, &link.name, output_dir)
}

/// Export every attachment link. Failures are logged and skipped.
pub fn export_all_attachments(
    store: &dyn HandleStore,
    links: &[AttachmentLink],
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::new();

    for link in links {
        match export_attachment(store, link, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    filename = %link.name,
                    error = %e,
                    "Failed to export attachment"
                );
            }
        }
    }

    Ok(paths)
}

/// Export the downloadable attachments of a parsed document directly.
pub fn export_document_attachments(
    doc: &ParsedDocument,
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    doc.downloadable()
        .map(|att: &Attachment| export_blob(&att.to_blob(), &att.filename, output_dir))
        .collect()
}

/// Sanitize a string for use in filenames.
///
/// Replaces invalid characters with `_` and truncates to `max_len`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    match sanitized.trim_start_matches('.') {
        "" => "unnamed".to_string(),
        s => s.to_string(),
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}
