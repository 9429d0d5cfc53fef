//! Remote collaborators: the file store and the legacy mail-format converter.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::category::{mime_from_extension, OCTET_STREAM};
use super::classify::RemoteError;
use crate::model::attachment::Attachment;
use crate::model::document::ParsedDocument;
use crate::parser::decode;

/// A file fetched from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// File bytes, base64-encoded.
    pub payload: String,
    /// Content type declared by the store. May be empty or generic.
    pub content_type: String,
}

/// Fetches file bytes by key.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<FetchedFile, RemoteError>;
}

/// Converts a legacy mail container (`.msg`) to the JSON envelope
/// `{ "html": ..., "attachments": [...] }`.
#[async_trait]
pub trait MailConverter: Send + Sync {
    async fn convert(&self, key: &str) -> Result<String, RemoteError>;
}

/// Serves files from a local directory. Keys are paths relative to `root`.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        let rel = Path::new(key);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        safe.then(|| self.root.join(rel))
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn fetch(&self, key: &str) -> Result<FetchedFile, RemoteError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| RemoteError::with_message(format!("Invalid file key: {key}")))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RemoteError::with_body_message(format!("File not found: {key}")));
            }
            Err(e) => {
                return Err(RemoteError::with_message(format!(
                    "Failed to read '{}': {e}",
                    path.display()
                )));
            }
        };

        let content_type = mime_from_extension(key).unwrap_or(OCTET_STREAM);
        debug!(key, size = bytes.len(), content_type, "Fetched local file");
        Ok(FetchedFile {
            payload: decode::encode_base64(&bytes),
            content_type: content_type.to_string(),
        })
    }
}

/// Runs an external program that prints the JSON envelope for a key.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MailConverter for CommandConverter {
    async fn convert(&self, key: &str) -> Result<String, RemoteError> {
        let output = tokio::process::Command::new(&self.program)
            .arg(key)
            .output()
            .await
            .map_err(|e| {
                RemoteError::with_message(format!(
                    "Failed to run converter '{}': {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemoteError::with_body_message(format!(
                "Converter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Converter used when none is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConverter;

#[async_trait]
impl MailConverter for NoConverter {
    async fn convert(&self, _key: &str) -> Result<String, RemoteError> {
        Err(RemoteError::with_message("No mail converter configured"))
    }
}

/// The converter's JSON envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertedMail {
    pub html: String,
    #[serde(default)]
    pub attachments: Vec<ConvertedAttachment>,
}

/// One attachment in the converter's envelope. `data` is base64 or raw text.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedAttachment {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub content_id: Option<String>,
}

impl ConvertedMail {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Convert into a document whose html is authoritative.
    pub fn into_document(self) -> ParsedDocument {
        let attachments = self
            .attachments
            .into_iter()
            .map(|a| Attachment::new(a.filename, a.content_id, a.content_type, a.data, None))
            .collect();
        ParsedDocument {
            html: self.html,
            text: String::new(),
            attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converted_mail_from_json() {
        let json = r#"{
            "html": "<p>hi</p>",
            "attachments": [
                {"filename": "a.pdf", "contentType": "application/pdf", "data": "JVBERg=="},
                {"filename": "logo.png", "contentType": "image/png", "data": "iVBO", "contentId": "logo"}
            ]
        }"#;
        let doc = ConvertedMail::from_json(json).expect("valid json").into_document();
        assert_eq!(doc.html, "<p>hi</p>");
        assert_eq!(doc.attachments.len(), 2);
        assert_eq!(doc.attachments[1].content_id.as_deref(), Some("logo"));
        assert_eq!(doc.downloadable().count(), 1);
    }

    #[test]
    fn test_converted_mail_requires_html() {
        assert!(ConvertedMail::from_json(r#"{"attachments": []}"#).is_err());
        assert!(ConvertedMail::from_json("not json").is_err());
    }

    #[test]
    fn test_converted_attachment_defaults() {
        let doc = ConvertedMail::from_json(r#"{"html":"","attachments":[{"data":"plain, text!"}]}"#)
            .expect("valid json")
            .into_document();
        let att = &doc.attachments[0];
        assert_eq!(att.filename, "unnamed");
        assert_eq!(att.content_type, "application/octet-stream");
        assert_eq!(att.to_blob().mime, "text/plain");
    }

    #[tokio::test]
    async fn test_local_source_reads_and_guesses_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("note.txt"), "hello").expect("write");

        let source = LocalFileSource::new(dir.path());
        let file = source.fetch("note.txt").await.expect("fetch");
        assert_eq!(file.content_type, "text/plain");
        assert_eq!(decode::decode_base64_to_text(&file.payload), "hello");
    }

    #[tokio::test]
    async fn test_local_source_missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = LocalFileSource::new(dir.path());
        let err = source.fetch("missing.pdf").await.expect_err("should fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_local_source_rejects_parent_components() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = LocalFileSource::new(dir.path());
        let err = source.fetch("../etc/passwd").await.expect_err("should fail");
        assert!(!err.is_not_found());
    }
}
