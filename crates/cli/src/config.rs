use anyhow::{Context, Result};
use std::path::Path;
use terraform_indexer::{
    ConfigProvider, FileIdentity, IndexOptions, IndexingConfig, StaticConfig,
};

/// Command-line overrides applied on top of every root's config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub exclude: Vec<String>,
    pub no_live: bool,
    pub queue_capacity: Option<usize>,
}

/// Per-root configuration: each root reads its own `.terraform-indexer.toml`.
pub struct WorkspaceConfig {
    roots: Vec<(FileIdentity, StaticConfig)>,
    fallback: StaticConfig,
}

impl WorkspaceConfig {
    pub async fn load<P: AsRef<Path>>(roots: &[P], overrides: &Overrides) -> Result<Self> {
        let mut loaded = Vec::with_capacity(roots.len());
        for root in roots {
            let root = root.as_ref();
            let mut config = IndexingConfig::load(root)
                .await
                .with_context(|| format!("Failed to load indexing config for {}", root.display()))?;
            apply_overrides(&mut config, overrides);
            let id = FileIdentity::new(root)?;
            let config = StaticConfig::new(config)
                .with_context(|| format!("Invalid exclude pattern for {}", root.display()))?;
            loaded.push((id, config));
        }

        let mut fallback = IndexingConfig::default();
        apply_overrides(&mut fallback, overrides);
        Ok(Self {
            roots: loaded,
            fallback: StaticConfig::new(fallback).context("Invalid exclude pattern")?,
        })
    }

    /// Live indexing stays on only if every root asks for it.
    pub fn live_indexing(&self) -> bool {
        self.roots
            .iter()
            .all(|(_, config)| config.config().live_indexing)
            && self.fallback.config().live_indexing
    }

    pub fn queue_capacity(&self) -> usize {
        self.roots
            .iter()
            .map(|(_, config)| config.config().queue_capacity)
            .max()
            .unwrap_or(self.fallback.config().queue_capacity)
    }

    fn for_file(&self, id: &FileIdentity) -> &StaticConfig {
        self.roots
            .iter()
            .filter(|(root, _)| root.contains(id))
            .max_by_key(|(root, _)| root.key().len())
            .map_or(&self.fallback, |(_, config)| config)
    }
}

fn apply_overrides(config: &mut IndexingConfig, overrides: &Overrides) {
    config.exclude.extend(overrides.exclude.iter().cloned());
    if overrides.no_live {
        config.live_indexing = false;
    }
    if let Some(capacity) = overrides.queue_capacity {
        config.queue_capacity = capacity;
    }
}

impl ConfigProvider for WorkspaceConfig {
    fn indexing(&self, id: &FileIdentity) -> IndexingConfig {
        self.for_file(id).indexing(id)
    }

    fn options(&self, id: &FileIdentity) -> IndexOptions {
        self.for_file(id).options(id)
    }
}
