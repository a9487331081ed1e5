use crate::error::Result;
use crate::identity::FileIdentity;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional per-root configuration file.
pub const CONFIG_FILE_NAME: &str = ".terraform-indexer.toml";

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Indexing settings, read from the `[indexing]` table of [`CONFIG_FILE_NAME`].
///
/// ```toml
/// [indexing]
/// enabled = true
/// live_indexing = true
/// exclude = ["**/fixtures/**", "legacy/*.tf"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexingConfig {
    /// Master switch; when off every create/change event is skipped.
    pub enabled: bool,
    /// Keep following created/changed files after the initial crawl.
    pub live_indexing: bool,
    /// Glob patterns of files that must never be indexed.
    pub exclude: Vec<String>,
    /// Capacity of the coordinator's event queue.
    pub queue_capacity: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            live_indexing: true,
            exclude: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    indexing: IndexingConfig,
}

impl IndexingConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        Ok(file.indexing)
    }

    /// Load `<root>/.terraform-indexer.toml`, falling back to defaults when it is absent.
    pub async fn load(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(CONFIG_FILE_NAME);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                log::debug!("Loading indexing config from {}", path.display());
                Self::from_toml_str(&raw)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn options(&self) -> Result<IndexOptions> {
        Ok(IndexOptions {
            exclude: ExcludeSet::new(&self.exclude)?,
        })
    }
}

/// Per-call options for index mutations.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub exclude: ExcludeSet,
}

/// Compiled exclude globs.
///
/// A file is excluded when a pattern matches either its path relative to the index root or
/// its full path.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Default for ExcludeSet {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            builder.add(Glob::new(pattern)?);
            kept.push(pattern.to_string());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, id: &FileIdentity, root: &FileIdentity) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(relative) = id.relative_to(root) {
            if self.set.is_match(&relative) {
                return true;
            }
        }
        self.set.is_match(id.key())
    }
}

/// Supplies indexing settings at index time.
pub trait ConfigProvider: Send + Sync {
    fn indexing(&self, id: &FileIdentity) -> IndexingConfig;

    fn options(&self, id: &FileIdentity) -> IndexOptions;
}

/// A fixed configuration shared by every root.
#[derive(Debug, Clone)]
pub struct StaticConfig {
    config: IndexingConfig,
    options: IndexOptions,
}

impl StaticConfig {
    pub fn new(config: IndexingConfig) -> Result<Self> {
        let options = config.options()?;
        Ok(Self { config, options })
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            config: IndexingConfig::default(),
            options: IndexOptions::default(),
        }
    }
}

impl ConfigProvider for StaticConfig {
    fn indexing(&self, _id: &FileIdentity) -> IndexingConfig {
        self.config.clone()
    }

    fn options(&self, _id: &FileIdentity) -> IndexOptions {
        self.options.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_indexing_table() {
        let config = IndexingConfig::from_toml_str(
            r#"
[indexing]
live_indexing = false
exclude = ["**/fixtures/**"]
"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert!(!config.live_indexing);
        assert_eq!(config.exclude, vec!["**/fixtures/**".to_string()]);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(
            IndexingConfig::from_toml_str("").unwrap(),
            IndexingConfig::default()
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(IndexingConfig::from_toml_str("[indexing]\nexlcude = []\n").is_err());
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(ExcludeSet::new(&["a/[b"]).is_err());
    }

    #[test]
    fn matches_relative_and_absolute_paths() {
        let root = FileIdentity::new("/ws").unwrap();
        let set = ExcludeSet::new(&["fixtures/**", "/abs/**/*.tf"]).unwrap();
        assert!(set.is_excluded(&FileIdentity::new("/ws/fixtures/a.tf").unwrap(), &root));
        assert!(!set.is_excluded(&FileIdentity::new("/ws/main.tf").unwrap(), &root));
        assert!(set.is_excluded(&FileIdentity::new("/abs/x/y.tf").unwrap(), &root));
    }

    #[tokio::test]
    async fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexingConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, IndexingConfig::default());

        tokio::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[indexing]\nenabled = false\n",
        )
        .await
        .unwrap();
        let config = IndexingConfig::load(dir.path()).await.unwrap();
        assert!(!config.enabled);
    }
}
