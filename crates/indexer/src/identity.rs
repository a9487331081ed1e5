use crate::error::{IndexerError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Kind of an indexable file, decided once from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `*.tf`
    Template,
    /// `*.tfvars`
    Variables,
    /// `*.tfplan`
    Plan,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "tf" => Some(Self::Template),
            "tfvars" => Some(Self::Variables),
            "tfplan" => Some(Self::Plan),
            _ => None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Variables => "variables",
            Self::Plan => "plan",
        }
    }
}

/// Canonical identity of a file on disk.
///
/// Two identities compare equal iff their normalised keys match. The key is the lexically
/// normalised absolute path with `/` separators, lower-cased on platforms whose default file
/// systems are case-insensitive.
#[derive(Clone)]
pub struct FileIdentity {
    path: PathBuf,
    key: String,
}

impl FileIdentity {
    /// Build an identity from a path. Relative paths are resolved against the current
    /// working directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(IndexerError::InvalidPath("empty path".to_string()));
        }
        let absolute = std::path::absolute(path)?;
        let path = normalize_lexically(&absolute);
        let key = identity_key(&path);
        Ok(Self { path, key })
    }

    /// Build an identity from a `file://` URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let url = url::Url::parse(uri)
            .map_err(|e| IndexerError::InvalidPath(format!("{uri}: {e}")))?;
        if url.scheme() != "file" {
            return Err(IndexerError::InvalidPath(format!(
                "{uri}: unsupported scheme {}",
                url.scheme()
            )));
        }
        let path = url
            .to_file_path()
            .map_err(|()| IndexerError::InvalidPath(format!("{uri}: not a local file path")))?;
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_path(&self.path)
    }

    /// Whether `self` names `other` or a directory containing it. Containment is decided on
    /// whole path components: `/ws/a` contains `/ws/a/main.tf` but not `/ws/ab/main.tf`.
    pub fn contains(&self, other: &Self) -> bool {
        if other.key == self.key {
            return true;
        }
        let Some(rest) = other.key.strip_prefix(&self.key) else {
            return false;
        };
        self.key.ends_with('/') || rest.starts_with('/')
    }

    /// Path of `self` relative to `root`, `/`-separated, if `root` contains it.
    pub fn relative_to(&self, root: &Self) -> Option<String> {
        if !root.contains(self) {
            return None;
        }
        let relative = self.path.strip_prefix(&root.path).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    }
}

impl PartialEq for FileIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FileIdentity {}

impl Hash for FileIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for FileIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileIdentity").field(&self.key).finish()
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn identity_key(path: &Path) -> String {
    let mut key = path.to_string_lossy().replace('\\', "/");
    while key.len() > 1 && key.ends_with('/') && !key.ends_with(":/") {
        key.pop();
    }
    if cfg!(any(windows, target_os = "macos")) {
        key = key.to_lowercase();
    }
    key
}
