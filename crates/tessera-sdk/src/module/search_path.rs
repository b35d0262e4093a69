//! Shared module search path with scoped entries.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// An ordered list of directories searched when resolving module imports.
///
/// Clones share the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct ModuleSearchPath {
    dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl ModuleSearchPath {
    /// An empty search path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A search path seeded with `dirs`, in order.
    #[must_use]
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: Arc::new(Mutex::new(dirs.into_iter().map(Into::into).collect())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current directories, in search order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    /// Whether `dir` is currently on the path.
    #[must_use]
    pub fn contains(&self, dir: &Path) -> bool {
        self.lock().iter().any(|d| d == dir)
    }

    /// Append a directory at the lowest priority.
    pub fn push_back(&self, dir: impl Into<PathBuf>) {
        self.lock().push(dir.into());
    }

    /// Put `dir` at the front until the returned guard is dropped.
    #[must_use = "the directory is removed as soon as the guard is dropped"]
    pub fn push_front(&self, dir: impl Into<PathBuf>) -> SearchPathGuard {
        let dir = dir.into();
        self.lock().insert(0, dir.clone());
        debug!(dir = %dir.display(), "Prepended module search path");
        SearchPathGuard {
            path: self.clone(),
            dir,
        }
    }

    /// Find the first directory containing the relative file `rel`.
    #[must_use]
    pub fn resolve(&self, rel: &Path) -> Option<PathBuf> {
        self.snapshot()
            .into_iter()
            .map(|d| d.join(rel))
            .find(|candidate| candidate.is_file())
    }
}

/// Removes a prepended directory from a [`ModuleSearchPath`] on drop.
///
/// Only the first occurrence is removed, so an entry that was already on
/// the path before the push survives.
#[derive(Debug)]
pub struct SearchPathGuard {
    path: ModuleSearchPath,
    dir: PathBuf,
}

impl SearchPathGuard {
    /// The directory this guard holds on the path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for SearchPathGuard {
    fn drop(&mut self) {
        let mut dirs = self.path.lock();
        if let Some(idx) = dirs.iter().position(|d| *d == self.dir) {
            dirs.remove(idx);
            debug!(dir = %self.dir.display(), "Removed module search path");
        }
    }
}
