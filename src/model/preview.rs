//! Per-session preview state exposed to the rendering layer.

use super::handle::ObjectHandle;
use crate::preview::category::Category;

/// Lifecycle of a preview session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// What the rendering layer displays.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum RenderSource {
    /// `data:` URI (images).
    DataUri(String),
    /// Handle to binary content (PDF, DOCX, anything downloadable).
    Handle(ObjectHandle),
    /// Self-contained HTML (eml / msg).
    Html(String),
    /// Decoded plain text.
    Text(String),
}

/// A downloadable attachment of a loaded mail preview.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AttachmentLink {
    pub name: String,
    pub url: ObjectHandle,
    pub mime_type: String,
}

/// State of one preview session.
///
/// `source` and `error` are never both set.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PreviewState {
    /// Monotonic id of the load that produced this state (0 when idle).
    pub load_id: u64,
    pub phase: Phase,
    /// Display name of the file being previewed.
    pub name: String,
    /// Effective MIME type after classification.
    pub mime: String,
    pub category: Option<Category>,
    pub source: Option<RenderSource>,
    pub attachments: Vec<AttachmentLink>,
    pub error: Option<String>,
}

impl PreviewState {
    /// A fresh state for a load that has just started.
    pub fn loading(load_id: u64, name: &str) -> Self {
        Self {
            load_id,
            phase: Phase::Loading,
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Move to `Loaded` with the given render source.
    pub fn finish(&mut self, source: RenderSource, attachments: Vec<AttachmentLink>) {
        self.phase = Phase::Loaded;
        self.source = Some(source);
        self.attachments = attachments;
        self.error = None;
    }

    /// Move to `Error`, dropping any render source.
    pub fn fail(&mut self, message: String) {
        self.phase = Phase::Error;
        self.source = None;
        self.attachments.clear();
        self.error = Some(message);
    }
}
