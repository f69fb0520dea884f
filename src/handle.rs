//! The currently active index, swappable without blocking readers.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::Result;
use crate::forest::ForestIndex;

/// Owns the active [`ForestIndex`] behind an atomically swappable pointer.
///
/// Readers take a snapshot with [`IndexHandle::current`] and keep it for the
/// duration of one query; a concurrent [`IndexHandle::publish`] never affects
/// a snapshot already taken.
pub struct IndexHandle {
    active: ArcSwap<ForestIndex>,
}

impl IndexHandle {
    pub fn new(index: ForestIndex) -> Self {
        Self {
            active: ArcSwap::from_pointee(index),
        }
    }

    pub fn current(&self) -> Arc<ForestIndex> {
        self.active.load_full()
    }

    /// Replace the active index, returning the one it replaced.
    pub fn publish(&self, index: ForestIndex) -> Arc<ForestIndex> {
        let previous = self.active.swap(Arc::new(index));
        let current = self.active.load();
        tracing::info!(
            vectors = current.len(),
            trees = current.trees().len(),
            "published new index"
        );
        previous
    }

    /// Load an index file completely, then publish it.
    ///
    /// On failure the previously active index stays in place.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<Arc<ForestIndex>> {
        let path = path.as_ref();
        match ForestIndex::load(path) {
            Ok(index) => Ok(self.publish(index)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "index reload failed, keeping current index");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.active.load();
        f.debug_struct("IndexHandle")
            .field("vectors", &current.len())
            .field("trees", &current.trees().len())
            .finish()
    }
}
