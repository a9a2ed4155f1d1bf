//! Path validation against a set of allowed root directories

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use log::debug;

use super::GuardError;

/// Deduplicated, absolute, lexically cleaned set of directories.
///
/// An empty set means "no restriction". Callers have to opt into that
/// explicitly by configuring no roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedRoots {
    roots: Vec<PathBuf>,
}

impl AllowedRoots {
    /// Normalize `dirs` against `base`: blank entries are dropped, relative
    /// entries are made absolute, duplicates collapse, output is sorted.
    pub fn new<I, P>(dirs: I, base: &Path) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut set = BTreeSet::new();
        for dir in dirs {
            let dir = dir.as_ref();
            let trimmed = dir.to_string_lossy();
            let trimmed = trimmed.trim();
            if trimmed.is_empty() {
                continue;
            }
            set.insert(absolutize(Path::new(trimmed), base));
        }
        Self {
            roots: set.into_iter().collect(),
        }
    }

    /// No roots at all: every path is accepted
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.roots
    }

    fn contains(&self, abs: &Path) -> bool {
        self.roots.iter().any(|root| abs.starts_with(root))
    }
}

/// Resolves tool-supplied paths and refuses anything that escapes the
/// configured roots.
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: AllowedRoots,
    /// Relative inputs are resolved against this directory
    base_dir: PathBuf,
}

impl PathGuard {
    pub fn new(roots: AllowedRoots, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = clean_path(&base_dir.into());
        Self { roots, base_dir }
    }

    pub fn roots(&self) -> &AllowedRoots {
        &self.roots
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Validate `path` and return its absolute form.
    ///
    /// The `..` check runs on the cleaned path: `a/../../etc` is rejected
    /// while `a..b.txt` is fine.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, GuardError> {
        if path.trim().is_empty() {
            return Err(GuardError::EmptyPath);
        }

        let cleaned = clean_path(Path::new(path));
        if has_parent_traversal(&cleaned) {
            debug!("Rejected traversal path: {}", path);
            return Err(GuardError::Traversal { path: path.to_string() });
        }

        let abs = absolutize(&cleaned, &self.base_dir);

        if self.roots.is_empty() || self.roots.contains(&abs) {
            return Ok(abs);
        }

        debug!("Rejected path outside allowed roots: {}", abs.display());
        Err(GuardError::OutsideAllowedRoots {
            path: abs,
            roots: self.roots.as_slice().to_vec(),
        })
    }

    /// Validate a working directory. Blank means "inherit the process's
    /// current directory" and yields `None`.
    pub fn resolve_working_dir(&self, dir: &str) -> Result<Option<PathBuf>, GuardError> {
        if dir.trim().is_empty() {
            return Ok(None);
        }
        self.resolve(dir).map(Some)
    }
}

/// Lexically clean a path: drop `.` segments, fold `name/..` pairs and drop
/// `..` directly under the root. Leading `..` segments of a relative path are
/// kept. Never touches the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

fn has_parent_traversal(cleaned: &Path) -> bool {
    cleaned.components().any(|c| matches!(c, Component::ParentDir))
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        clean_path(path)
    } else {
        clean_path(&base.join(path))
    }
}
