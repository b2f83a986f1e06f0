//! Opaque document handles.
//!
//! A [`DocumentHandle`] names a PDF and yields its raw bytes without
//! committing the pipeline to a particular transport. Files on disk and
//! in-memory uploads (e.g. from an HTTP multipart body) go through the
//! same type.

use std::path::PathBuf;

/// Where the document bytes come from.
#[derive(Debug, Clone)]
enum Payload {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// An opaque handle to one source document.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    /// Explicit display name, preferred over the path for titles.
    name: Option<String>,
    payload: Payload,
}

impl DocumentHandle {
    /// A document backed by a file on disk. The path doubles as the title
    /// unless a display name is set.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            payload: Payload::Path(path.into()),
        }
    }

    /// A document backed by an in-memory byte buffer, as produced by an
    /// upload stream.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: Some(name.into()),
            payload: Payload::Bytes(bytes),
        }
    }

    /// Override the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Document title: the display name if present, else the path as-is.
    pub fn title(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.payload {
            Payload::Path(p) => p.display().to_string(),
            Payload::Bytes(_) => "(unnamed)".to_string(),
        }
    }

    /// Read the raw document bytes.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.payload {
            Payload::Path(p) => std::fs::read(p),
            Payload::Bytes(b) => Ok(b.clone()),
        }
    }
}
