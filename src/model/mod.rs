//! Core data model types: attachments, parsed documents, object handles and preview state.

pub mod attachment;
pub mod document;
pub mod handle;
pub mod preview;
