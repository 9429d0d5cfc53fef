//! `docpreview`: a document preview pipeline.
//!
//! This crate parses MIME messages recursively into renderable HTML or text
//! plus a flat attachment list, embeds inline `cid:` images as data URIs, and
//! dispatches fetched files to a rendering strategy while owning the
//! revocable object handles that strategy creates.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod preview;
