//! Preview session: fetch, classify, render and own the resulting handles.
//!
//! A session moves `Idle -> Loading -> Loaded | Error -> Idle`. Opening a
//! file closes whatever was shown before, and closing revokes every handle
//! the session created, exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::category::{self, Category, Resolved};
use super::handles::{self, HandleOwner, HandleStore};
use super::source::{ConvertedMail, FileSource, MailConverter};
use crate::config::{Config, MessagesConfig};
use crate::error::{PreviewError, Result};
use crate::model::document::ParsedDocument;
use crate::model::handle::{Blob, ObjectHandle};
use crate::model::preview::{AttachmentLink, Phase, PreviewState, RenderSource};
use crate::parser::decode;
use crate::parser::embed::embed_images_limited;
use crate::parser::mime::MimeParser;

/// One preview surface and the handles it owns.
pub struct PreviewSession {
    source: Arc<dyn FileSource>,
    converter: Arc<dyn MailConverter>,
    handles: HandleOwner,
    state: PreviewState,
    parser: MimeParser,
    messages: MessagesConfig,
    max_inline_image_bytes: usize,
    detached_delay: Duration,
    last_load_id: u64,
}

impl PreviewSession {
    pub fn new(
        source: Arc<dyn FileSource>,
        converter: Arc<dyn MailConverter>,
        store: Arc<dyn HandleStore>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            converter,
            handles: HandleOwner::new(store),
            state: PreviewState::default(),
            parser: MimeParser::new(config.preview.max_mime_depth),
            messages: config.messages.clone(),
            max_inline_image_bytes: config.preview.max_inline_image_bytes,
            detached_delay: config.preview.detached_revoke_delay(),
            last_load_id: 0,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn handles(&self) -> &HandleOwner {
        &self.handles
    }

    /// Fetch `key` and render it for display under `name`.
    ///
    /// Never fails: any error ends up in [`PreviewState::error`]. Loads on one
    /// session are serialized by `&mut self`, so the state always belongs to
    /// the most recent call.
    pub async fn open(&mut self, key: &str, name: &str) -> &PreviewState {
        self.close();
        self.last_load_id += 1;
        self.state = PreviewState::loading(self.last_load_id, name);
        info!(load_id = self.last_load_id, key, name, "Opening preview");

        match self.load(key, name).await {
            Ok((source, attachments)) => {
                debug!(
                    load_id = self.state.load_id,
                    attachments = attachments.len(),
                    "Preview loaded"
                );
                self.state.finish(source, attachments);
            }
            Err(err) => {
                warn!(load_id = self.state.load_id, key, error = %err, "Preview failed");
                let message = self.user_message(&err, name);
                self.handles.release_all();
                self.state.fail(message);
            }
        }
        &self.state
    }

    /// Revoke every handle and return to `Idle`. Returns the number of
    /// handles revoked; closing an idle session revokes nothing.
    pub fn close(&mut self) -> usize {
        let released = self.handles.release_all();
        if self.state.phase != Phase::Idle {
            info!(load_id = self.state.load_id, released, "Closing preview");
        }
        self.state = PreviewState::default();
        released
    }

    /// Hand `blob` to a rendering context this session does not own.
    ///
    /// The handle outlives the session and is revoked after the configured delay.
    pub fn open_detached(&self, blob: Blob) -> ObjectHandle {
        handles::open_detached(self.handles.store(), blob, self.detached_delay)
    }

    /// Open the visible attachment at `index` in a detached context.
    pub fn detach_attachment(&self, index: usize) -> Option<ObjectHandle> {
        let link = self.state.attachments.get(index)?;
        let blob = self.handles.store().resolve(&link.url)?;
        Some(self.open_detached(blob))
    }

    async fn load(&mut self, key: &str, name: &str) -> Result<(RenderSource, Vec<AttachmentLink>)> {
        let fetched = self.source.fetch(key).await.map_err(|e| {
            if e.is_not_found() {
                PreviewError::NotFound(key.to_string())
            } else {
                PreviewError::Remote(e)
            }
        })?;

        let Resolved { category, mime } = category::resolve(&fetched.content_type, name);
        debug!(%category, mime = %mime, declared = %fetched.content_type, "Classified file");
        self.state.mime = mime.clone();
        self.state.category = Some(category.clone());

        match category {
            Category::Image => {
                let compact: String = fetched
                    .payload
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                Ok((RenderSource::DataUri(format!("data:{mime};base64,{compact}")), Vec::new()))
            }
            Category::Text => Ok((
                RenderSource::Text(decode::decode_base64_to_text(&fetched.payload)),
                Vec::new(),
            )),
            Category::Eml => {
                let bytes = decode::decode_base64(&fetched.payload).ok_or_else(|| {
                    PreviewError::conversion("eml", "payload is not valid base64")
                })?;
                let doc = self.parser.parse_bytes(&bytes);
                Ok(self.show_document(doc))
            }
            Category::Msg => {
                let json = self
                    .converter
                    .convert(key)
                    .await
                    .map_err(|e| PreviewError::conversion("msg", e))?;
                let doc = ConvertedMail::from_json(&json)
                    .map_err(|e| PreviewError::conversion("msg", e))?
                    .into_document();
                Ok(self.show_document(doc))
            }
            Category::Pdf | Category::Docx | Category::OfficeDoc | Category::Other(_) => {
                let bytes = decode::decode_base64(&fetched.payload).ok_or_else(|| {
                    PreviewError::InvalidPayload(format!("'{name}' is not valid base64"))
                })?;
                let handle = self
                    .handles
                    .set_primary(Blob::new(bytes, category::handle_safe_mime(&mime)));
                Ok((RenderSource::Handle(handle), Vec::new()))
            }
        }
    }

    /// Embed inline images and create a download handle per visible attachment.
    fn show_document(&mut self, doc: ParsedDocument) -> (RenderSource, Vec<AttachmentLink>) {
        let html = embed_images_limited(
            &doc.render_html(),
            &doc.attachments,
            self.max_inline_image_bytes,
        );

        let links = doc
            .downloadable()
            .map(|att| {
                let blob = att.to_blob();
                let mime_type = blob.mime.clone();
                AttachmentLink {
                    name: att.filename.clone(),
                    url: self.handles.add_attachment(blob),
                    mime_type,
                }
            })
            .collect();

        (RenderSource::Html(html), links)
    }

    fn user_message(&self, err: &PreviewError, name: &str) -> String {
        match err {
            PreviewError::NotFound(_) => self.messages.file_not_found_for(name),
            PreviewError::Remote(remote) => {
                let message = remote.message();
                if message.trim().is_empty() {
                    self.messages.unknown_error.clone()
                } else {
                    message
                }
            }
            PreviewError::Conversion { format, .. } => {
                format!("Unable to display this {format} file.")
            }
            other => other.to_string(),
        }
    }
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("state", &self.state)
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}
