use crate::error::{IndexerError, Result};
use crate::filter::WorkspaceFilter;
use crate::identity::FileIdentity;
use crate::sources::EventSource;
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Enumerates `*.tf`, `*.tfvars` and `*.tfplan` files under a set of roots.
///
/// Paths are filtered with [`WorkspaceFilter`], the same rules the watcher applies: hidden
/// directories (including `.terraform`, where `terraform init` vendors modules) and
/// git-ignored paths are skipped. Results are sorted so crawls are reproducible.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceScanner {
    roots: Vec<PathBuf>,
}

impl WorkspaceScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            roots: vec![root.as_ref().to_path_buf()],
        }
    }

    pub fn with_roots<P: AsRef<Path>>(roots: &[P]) -> Self {
        Self {
            roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
        }
    }

    pub fn scan(&self) -> Result<Vec<FileIdentity>> {
        let filter = WorkspaceFilter::new(&self.roots)?;
        let mut found = Vec::new();
        for root in &self.roots {
            let entry_filter = filter.clone();
            let walker = WalkBuilder::new(root)
                .standard_filters(false)
                .follow_links(false)
                .filter_entry(move |entry| {
                    entry.depth() == 0
                        || !entry_filter.is_ignored(
                            entry.path(),
                            entry.file_type().is_some_and(|ft| ft.is_dir()),
                        )
                })
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        log::warn!("Skipping unreadable entry under {}: {err}", root.display());
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                match FileIdentity::new(entry.path()) {
                    Ok(id) if filter.is_indexable(&id) => found.push(id),
                    Ok(_) => {}
                    Err(err) => log::warn!("Skipping {}: {err}", entry.path().display()),
                }
            }
        }
        found.sort();
        found.dedup();
        Ok(found)
    }
}

#[async_trait]
impl EventSource for WorkspaceScanner {
    async fn enumerate(&self) -> Result<Vec<FileIdentity>> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(|e| IndexerError::Other(format!("workspace scan failed: {e}")))?
    }
}
