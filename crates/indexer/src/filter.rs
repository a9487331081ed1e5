use crate::error::Result;
use crate::identity::FileIdentity;
use ignore::gitignore::Gitignore;
use ignore::Match;
use std::path::Path;

/// Decides which paths under a set of roots take part in indexing.
///
/// The crawl and the watcher share this filter, so a file is either seen by both or by neither.
/// A path is ignored when a component below its root is hidden (starts with `.`, which covers
/// `.git` and `.terraform`) or when a `.gitignore` between the root and the path ignores it.
/// The deepest `.gitignore` with a matching rule decides. Paths outside every root are ignored.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFilter {
    roots: Vec<FileIdentity>,
}

impl WorkspaceFilter {
    pub fn new<P: AsRef<Path>>(roots: &[P]) -> Result<Self> {
        let roots = roots
            .iter()
            .map(|root| FileIdentity::new(root))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { roots })
    }

    /// Whether `id` is a template, variables or plan file that is not ignored.
    pub fn is_indexable(&self, id: &FileIdentity) -> bool {
        id.kind().is_some() && !self.is_ignored(id.path(), false)
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(id) = FileIdentity::new(path) else {
            return true;
        };
        let Some(root) = self.owning_root(&id) else {
            return true;
        };
        let Some(relative) = id.relative_to(root) else {
            return true;
        };
        if relative.split('/').any(|component| component.starts_with('.')) {
            return true;
        }
        gitignored(id.path(), root.path(), is_dir)
    }

    fn owning_root(&self, id: &FileIdentity) -> Option<&FileIdentity> {
        self.roots
            .iter()
            .filter(|root| root.contains(id))
            .max_by_key(|root| root.key().len())
    }
}

fn gitignored(path: &Path, root: &Path, is_dir: bool) -> bool {
    for dir in path.ancestors().skip(1) {
        if !dir.starts_with(root) {
            break;
        }
        let file = dir.join(".gitignore");
        if !file.is_file() {
            continue;
        }
        let (matcher, err) = Gitignore::new(&file);
        if let Some(err) = err {
            log::debug!("Partially invalid {}: {err}", file.display());
        }
        match matcher.matched_path_or_any_parents(path, is_dir) {
            Match::Ignore(_) => return true,
            Match::Whitelist(_) => return false,
            Match::None => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &Path) -> FileIdentity {
        FileIdentity::new(path).unwrap()
    }

    #[test]
    fn hidden_and_gitignored_paths_are_not_indexable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "vendor/\n").unwrap();
        std::fs::create_dir_all(root.join("env")).unwrap();
        std::fs::write(root.join("env/.gitignore"), "*.tfplan\n!keep.tfplan\n").unwrap();

        let filter = WorkspaceFilter::new(&[root]).unwrap();

        assert!(filter.is_indexable(&id(&root.join("main.tf"))));
        assert!(filter.is_indexable(&id(&root.join("env/prod.tfvars"))));
        assert!(filter.is_indexable(&id(&root.join("env/keep.tfplan"))));
        assert!(!filter.is_indexable(&id(&root.join("env/out.tfplan"))));
        assert!(!filter.is_indexable(&id(&root.join("vendor/x.tf"))));
        assert!(!filter.is_indexable(&id(&root.join(".github/ci.tf"))));
        assert!(!filter.is_indexable(&id(&root.join(".terraform/modules/vpc/main.tf"))));
        assert!(!filter.is_indexable(&id(&root.join("README.md"))));
    }

    #[test]
    fn paths_outside_every_root_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let filter = WorkspaceFilter::new(&[dir.path()]).unwrap();

        assert!(filter.is_ignored(&other.path().join("main.tf"), false));
        assert!(!filter.is_ignored(&dir.path().join("main.tf"), false));
    }

    #[test]
    fn hidden_root_itself_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".stacks");
        std::fs::create_dir_all(&root).unwrap();

        let filter = WorkspaceFilter::new(&[&root]).unwrap();
        assert!(filter.is_indexable(&id(&root.join("main.tf"))));
    }
}
