//! Message parsing: transfer decoding, header parsing, recursive MIME and inline image embedding.

pub mod decode;
pub mod embed;
pub mod header;
pub mod mime;
