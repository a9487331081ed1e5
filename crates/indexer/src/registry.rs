use crate::document::{DocumentParser, HclDocumentParser};
use crate::error::Result;
use crate::identity::FileIdentity;
use crate::index::Index;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// One [`Index`] per registered workspace root.
///
/// Resolution is recomputed from the registered roots on every call, so adding or removing a
/// root takes effect immediately.
pub struct IndexRegistry {
    indexes: BTreeMap<FileIdentity, Index>,
    parser: Arc<dyn DocumentParser>,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::with_parser(Arc::new(HclDocumentParser))
    }

    pub fn with_parser(parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            indexes: BTreeMap::new(),
            parser,
        }
    }

    /// Register `root`, creating an empty index for it. An already registered root keeps its
    /// index.
    pub fn register_root(&mut self, root: impl AsRef<Path>) -> Result<&mut Index> {
        let root = FileIdentity::new(root)?;
        let parser = Arc::clone(&self.parser);
        Ok(self.indexes.entry(root.clone()).or_insert_with(|| {
            log::info!("Registered workspace root {root}");
            Index::with_parser(root, parser)
        }))
    }

    /// Drop the index of `root`, returning it if it was registered.
    pub fn unregister_root(&mut self, root: impl AsRef<Path>) -> Result<Option<Index>> {
        let root = FileIdentity::new(root)?;
        let removed = self.indexes.remove(&root);
        if removed.is_some() {
            log::info!("Unregistered workspace root {root}");
        }
        Ok(removed)
    }

    pub fn roots(&self) -> impl Iterator<Item = &FileIdentity> {
        self.indexes.keys()
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// The index owning `id`: the most specific registered root containing it.
    pub fn resolve(&self, id: &FileIdentity) -> Option<&Index> {
        let root = self.owning_root(id)?.clone();
        self.indexes.get(&root)
    }

    pub fn resolve_mut(&mut self, id: &FileIdentity) -> Option<&mut Index> {
        let root = self.owning_root(id)?.clone();
        self.indexes.get_mut(&root)
    }

    fn owning_root(&self, id: &FileIdentity) -> Option<&FileIdentity> {
        self.indexes
            .keys()
            .filter(|root| root.contains(id))
            .max_by_key(|root| root.key().len())
    }
}
