//! Projection trees: arena-allocated binary trees over store slots.
//!
//! Nodes live in a `Vec<Node>` addressed by [`NodeId`]. The root is always
//! node 0 and every child is allocated after its parent, so child ids are
//! strictly greater than their parent's id. The codec relies on that to
//! reject cyclic node tables.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::store::{Slot, VectorStore};

use super::split::{Side, Split};

/// Index of a node inside one tree's arena.
pub type NodeId = u32;

pub const ROOT: NodeId = 0;

/// Random pivot draws per node before the ordered fallback split.
pub const MAX_SPLIT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Internal {
        split: Split,
        left: NodeId,
        right: NodeId,
    },
    Leaf {
        slots: Vec<Slot>,
    },
}

/// Shape summary of one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub depth: usize,
    pub max_leaf_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionTree {
    nodes: Vec<Node>,
}

impl ProjectionTree {
    /// Build one tree over every slot in `store`.
    ///
    /// The tree is a pure function of the store contents, `leaf_capacity`
    /// and `seed`.
    pub fn build(store: &VectorStore, leaf_capacity: usize, seed: u64) -> ProjectionTree {
        let mut builder = TreeBuilder {
            store,
            leaf_capacity: leaf_capacity.max(1),
            rng: StdRng::seed_from_u64(seed),
            nodes: vec![Node::Leaf { slots: Vec::new() }],
            fallback_splits: 0,
        };
        builder.run();

        let fallbacks = builder.fallback_splits;
        let tree = ProjectionTree {
            nodes: builder.nodes,
        };
        if fallbacks > 0 {
            tracing::debug!(fallbacks, "tree used ordered fallback splits");
        }
        tree
    }

    /// Wrap a decoded node table. Callers must have validated it.
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> ProjectionTree {
        ProjectionTree { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            node_count: self.nodes.len(),
            ..TreeStats::default()
        };
        // Child ids always exceed their parent's, so one forward pass sees
        // every parent before its children.
        let mut depth = vec![0usize; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            stats.depth = stats.depth.max(depth[id]);
            match node {
                Node::Internal { left, right, .. } => {
                    depth[*left as usize] = depth[id] + 1;
                    depth[*right as usize] = depth[id] + 1;
                }
                Node::Leaf { slots } => {
                    stats.leaf_count += 1;
                    stats.max_leaf_size = stats.max_leaf_size.max(slots.len());
                }
            }
        }
        stats
    }
}

struct TreeBuilder<'a> {
    store: &'a VectorStore,
    leaf_capacity: usize,
    rng: StdRng,
    nodes: Vec<Node>,
    fallback_splits: usize,
}

impl TreeBuilder<'_> {
    /// Iterative so pathological inputs cannot exhaust the call stack.
    fn run(&mut self) {
        let all: Vec<Slot> = (0..self.store.len() as Slot).collect();
        let mut pending = vec![(ROOT, all)];

        while let Some((id, slots)) = pending.pop() {
            if slots.len() <= self.leaf_capacity {
                self.nodes[id as usize] = Node::Leaf { slots };
                continue;
            }

            let (split, left_slots, right_slots) = self.partition(slots);
            let left = self.alloc();
            let right = self.alloc();
            self.nodes[id as usize] = Node::Internal { split, left, right };

            pending.push((right, right_slots));
            pending.push((left, left_slots));
        }
    }

    fn alloc(&mut self) -> NodeId {
        self.nodes.push(Node::Leaf { slots: Vec::new() });
        (self.nodes.len() - 1) as NodeId
    }

    /// Split `slots` (len >= 2) into two non-empty halves.
    ///
    /// Slot order is preserved on both sides.
    fn partition(&mut self, slots: Vec<Slot>) -> (Split, Vec<Slot>, Vec<Slot>) {
        let metric = self.store.metric();
        let mut last = None;

        for _ in 0..MAX_SPLIT_ATTEMPTS {
            let i = self.rng.gen_range(0..slots.len());
            let mut j = self.rng.gen_range(0..slots.len() - 1);
            if j >= i {
                j += 1;
            }
            let split = Split::from_pivots(
                metric,
                self.store.row(slots[i]),
                self.store.row(slots[j]),
            );

            let (left, right): (Vec<Slot>, Vec<Slot>) = slots
                .iter()
                .partition(|&&s| split.side_of(self.store.row(s), s) == Side::Left);
            if !left.is_empty() && !right.is_empty() {
                return (split, left, right);
            }
            last = Some(split);
        }

        // Every draw put all slots on one side (e.g. duplicate vectors).
        // Halving by slot order always terminates.
        self.fallback_splits += 1;
        let split = last.unwrap_or_else(|| Split {
            normal: vec![0.0; self.store.dimension()],
            offset: 0.0,
        });
        let mut left = slots;
        let right = left.split_off(left.len() / 2);
        (split, left, right)
    }
}
