//! Priority queues for the query engine, with total ordering over f32 keys.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::store::Slot;

use super::tree::NodeId;

/// A scored result slot.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub slot: Slot,
    pub distance: f32,
}

impl Candidate {
    pub fn new(slot: Slot, distance: f32) -> Self {
        Self { slot, distance }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Ascending distance, ties broken by ascending slot.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

/// Max-heap bounded to the best `limit` candidates (worst one on top).
pub struct TopK {
    heap: BinaryHeap<Candidate>,
    limit: usize,
}

impl TopK {
    pub fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(1024)),
            limit,
        }
    }

    /// Push and pop the max if size exceeds limit, keeping only the closest `limit` candidates.
    pub fn push(&mut self, c: Candidate) {
        if self.limit == 0 {
            return;
        }
        if self.heap.len() < self.limit {
            self.heap.push(c);
        } else if self.heap.peek().is_some_and(|worst| c < *worst) {
            self.heap.pop();
            self.heap.push(c);
        }
    }

    /// Drain into a Vec sorted ascending by (distance, slot).
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// A subtree waiting to be explored.
///
/// `priority` is the smallest margin crossed on the way down, negated for
/// the side the query does not fall on. Higher means more promising.
#[derive(Debug, Clone, Copy)]
pub struct PendingNode {
    pub priority: f32,
    pub tree: u32,
    pub node: NodeId,
}

impl PartialEq for PendingNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingNode {}

impl PartialOrd for PendingNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Highest priority first; on ties the lower (tree, node) pair wins so
// exploration order is fully deterministic.
impl Ord for PendingNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Shared best-first queue of pending subtrees across all trees.
#[derive(Default)]
pub struct Frontier {
    heap: BinaryHeap<PendingNode>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: f32, tree: u32, node: NodeId) {
        self.heap.push(PendingNode {
            priority,
            tree,
            node,
        });
    }

    pub fn pop(&mut self) -> Option<PendingNode> {
        self.heap.pop()
    }
}
