//! Revocable object handles and the binary content behind them.

use std::fmt;

/// Binary content with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime: &str) -> Self {
        Self {
            bytes,
            mime: mime.to_string(),
        }
    }
}

/// An opaque, revocable reference to a [`Blob`], exposed as a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ObjectHandle {
    id: u64,
    url: String,
}

impl ObjectHandle {
    pub fn new(id: u64, url: String) -> Self {
        Self { id, url }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
