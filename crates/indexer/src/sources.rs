use crate::error::Result;
use crate::identity::FileIdentity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Current text of a file as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    pub text: String,
    /// The host holds edits that are not saved yet; the text must not be indexed.
    pub unstable: bool,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn get_text(&self, id: &FileIdentity) -> io::Result<TextSnapshot>;
}

#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// One-shot enumeration of every indexable file, used by the initial crawl.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<FileIdentity>>;
}

/// Reads straight from disk. Saved files are always stable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[async_trait]
impl ContentSource for FsSource {
    async fn get_text(&self, id: &FileIdentity) -> io::Result<TextSnapshot> {
        let text = tokio::fs::read_to_string(id.path()).await?;
        Ok(TextSnapshot {
            text,
            unstable: false,
        })
    }
}

#[async_trait]
impl ByteSource for FsSource {
    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// Content source layering open editor buffers over another source.
///
/// Buffers opened with `dirty = true` report themselves unstable until they are saved or
/// closed.
pub struct OverlaySource {
    inner: Arc<dyn ContentSource>,
    buffers: RwLock<HashMap<FileIdentity, TextSnapshot>>,
}

impl OverlaySource {
    pub fn new(inner: Arc<dyn ContentSource>) -> Self {
        Self {
            inner,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    pub fn open(&self, id: FileIdentity, text: impl Into<String>, dirty: bool) {
        let snapshot = TextSnapshot {
            text: text.into(),
            unstable: dirty,
        };
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, snapshot);
    }

    pub fn close(&self, id: &FileIdentity) {
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn is_open(&self, id: &FileIdentity) -> bool {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

#[async_trait]
impl ContentSource for OverlaySource {
    async fn get_text(&self, id: &FileIdentity) -> io::Result<TextSnapshot> {
        let buffered = self
            .buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        match buffered {
            Some(snapshot) => Ok(snapshot),
            None => self.inner.get_text(id).await,
        }
    }
}
