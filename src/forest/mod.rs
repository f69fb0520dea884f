//! Random-projection forest index.
//!
//! A forest is a set of independently seeded [`ProjectionTree`]s sharing one
//! read-only [`VectorStore`]. Trees are built in parallel with rayon; each
//! tree draws from its own `StdRng` seeded from the forest seed and the
//! tree's ordinal, so a fixed seed reproduces the index bit for bit.

pub mod frontier;
pub mod search;
pub mod split;
pub mod tree;

pub use search::{Neighbor, Query, SearchParams};
pub use split::{Side, Split};
pub use tree::{Node, NodeId, ProjectionTree, TreeStats};

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::distance::Metric;
use crate::error::{ForestError, Result};
use crate::store::VectorStore;
use crate::vector::Vector;

/// Construction parameters for a forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    /// Number of independent trees.
    pub tree_count: usize,
    /// Maximum slots per leaf.
    pub leaf_capacity: usize,
    /// Root seed; tree `i` uses [`tree_seed`]`(seed, i)`.
    pub seed: u64,
    pub metric: Metric,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            tree_count: 10,
            leaf_capacity: 32,
            seed: 42,
            metric: Metric::Angular,
        }
    }
}

impl ForestParams {
    pub fn new(tree_count: usize, leaf_capacity: usize, seed: u64) -> Self {
        Self {
            tree_count,
            leaf_capacity,
            seed,
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tree_count == 0 {
            return Err(ForestError::InvalidParameter(
                "tree_count must be at least 1".to_string(),
            ));
        }
        if self.tree_count > u32::MAX as usize {
            return Err(ForestError::InvalidParameter(format!(
                "tree_count {} does not fit in 32 bits",
                self.tree_count
            )));
        }
        if self.leaf_capacity == 0 {
            return Err(ForestError::InvalidParameter(
                "leaf_capacity must be at least 1".to_string(),
            ));
        }
        if self.leaf_capacity > u32::MAX as usize {
            return Err(ForestError::InvalidParameter(format!(
                "leaf_capacity {} does not fit in 32 bits",
                self.leaf_capacity
            )));
        }
        Ok(())
    }
}

/// Seed for the tree at `ordinal`, derived from the forest seed.
pub fn tree_seed(seed: u64, ordinal: usize) -> u64 {
    seed ^ (ordinal as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// An immutable forest of projection trees over a shared vector store.
#[derive(Debug)]
pub struct ForestIndex {
    store: Arc<VectorStore>,
    trees: Vec<ProjectionTree>,
    params: ForestParams,
}

impl ForestIndex {
    /// Build a forest from `(item_id, vector)` pairs.
    pub fn build<I, S>(vectors: I, params: ForestParams) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vector)>,
        S: Into<String>,
    {
        params.validate()?;
        let store = VectorStore::create(params.metric, vectors)?;
        Self::build_from_store(Arc::new(store), params)
    }

    /// Build a forest over an existing store. `params.metric` is taken from the store.
    pub fn build_from_store(store: Arc<VectorStore>, params: ForestParams) -> Result<Self> {
        params.validate()?;
        let params = ForestParams {
            metric: store.metric(),
            ..params
        };
        let start = Instant::now();

        let trees: Vec<ProjectionTree> = (0..params.tree_count)
            .into_par_iter()
            .map(|ordinal| {
                let tree = ProjectionTree::build(
                    &store,
                    params.leaf_capacity,
                    tree_seed(params.seed, ordinal),
                );
                let stats = tree.stats();
                tracing::debug!(
                    tree = ordinal,
                    nodes = stats.node_count,
                    depth = stats.depth,
                    "built projection tree"
                );
                tree
            })
            .collect();

        tracing::info!(
            vectors = store.len(),
            dimension = store.dimension(),
            trees = trees.len(),
            leaf_capacity = params.leaf_capacity,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "forest index built"
        );

        Ok(Self {
            store,
            trees,
            params,
        })
    }

    /// Assemble an index from decoded parts.
    pub(crate) fn from_parts(
        store: Arc<VectorStore>,
        trees: Vec<ProjectionTree>,
        params: ForestParams,
    ) -> Self {
        Self {
            store,
            trees,
            params,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn trees(&self) -> &[ProjectionTree] {
        &self.trees
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn metric(&self) -> Metric {
        self.store.metric()
    }

    pub fn stats(&self) -> Vec<TreeStats> {
        self.trees.iter().map(ProjectionTree::stats).collect()
    }
}
