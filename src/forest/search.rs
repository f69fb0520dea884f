//! Best-first query engine.
//!
//! Every tree contributes its root to one shared [`Frontier`]. Popping a
//! pending subtree descends greedily to a leaf on the query's side of each
//! split, parking the sibling with a priority equal to the smallest margin
//! crossed so far (negated for the sibling). Leaves feed a deduplicated
//! candidate set until the budget is met or the frontier runs dry; the
//! candidates are then ranked by exact distance.
//!
//! Exploration order never depends on the budget, so a larger budget always
//! sees a superset of the candidates a smaller one sees.

use std::borrow::Cow;
use std::collections::HashSet;

use rayon::prelude::*;

use crate::distance::Metric;
use crate::error::{ForestError, Result};
use crate::store::Slot;

use super::frontier::{Candidate, Frontier, TopK};
use super::split::{side_for_margin, Side};
use super::tree::{Node, ROOT};
use super::ForestIndex;

/// Query-time tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Candidate budget as a multiple of k. Larger means higher recall and
    /// higher latency.
    pub budget_factor: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { budget_factor: 10 }
    }
}

impl SearchParams {
    pub fn new(budget_factor: usize) -> Result<Self> {
        if budget_factor == 0 {
            return Err(ForestError::InvalidParameter(
                "budget_factor must be at least 1".to_string(),
            ));
        }
        Ok(Self { budget_factor })
    }

    /// Visit every leaf of every tree.
    pub fn exhaustive() -> Self {
        Self {
            budget_factor: usize::MAX,
        }
    }

    /// Number of distinct candidates to gather for `k` results.
    pub fn budget(&self, k: usize) -> usize {
        k.saturating_mul(self.budget_factor.max(1))
    }
}

/// What to search around.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// Self-query by item identifier; the item itself is excluded.
    Item(&'a str),
    /// Self-query by slot; the slot itself is excluded.
    Slot(Slot),
    /// An external vector of the store's dimension.
    Vector(&'a [f32]),
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub slot: Slot,
    pub item_id: String,
    pub distance: f32,
}

struct ResolvedQuery<'a> {
    vector: &'a [f32],
    norm: f64,
    exclude: Option<Slot>,
}

impl ForestIndex {
    /// Approximate top-`k` neighbors of `query`, nearest first.
    ///
    /// Ties in distance are broken by ascending slot. Asking for more
    /// neighbors than exist returns all of them.
    pub fn query(&self, query: Query<'_>, k: usize, params: &SearchParams) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(ForestError::InvalidK { k });
        }
        let resolved = self.resolve(query)?;
        let store = self.store();

        let wanted = k.saturating_add(resolved.exclude.is_some() as usize);
        let candidates = self.collect_candidates(
            &resolved.routing_vector(store.metric()),
            resolved.exclude.unwrap_or(0),
            params.budget(wanted),
        );

        let mut top = TopK::new(k);
        for slot in candidates {
            if Some(slot) == resolved.exclude {
                continue;
            }
            let distance = store.distance_to(resolved.vector, resolved.norm, slot);
            top.push(Candidate::new(slot, distance));
        }

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                slot: c.slot,
                item_id: store.identifier_of(c.slot).unwrap_or_default().to_string(),
                distance: c.distance,
            })
            .collect())
    }

    /// The `top_n` items most similar to `item_id`, excluding itself.
    pub fn recommend(&self, item_id: &str, top_n: usize, params: &SearchParams) -> Result<Vec<Neighbor>> {
        self.query(Query::Item(item_id), top_n, params)
    }

    /// Answer many self-queries in parallel; results keep the input order.
    pub fn recommend_many<S>(
        &self,
        item_ids: &[S],
        top_n: usize,
        params: &SearchParams,
    ) -> Vec<Result<Vec<Neighbor>>>
    where
        S: AsRef<str> + Sync,
    {
        item_ids
            .par_iter()
            .map(|id| self.recommend(id.as_ref(), top_n, params))
            .collect()
    }

    fn resolve<'a>(&'a self, query: Query<'a>) -> Result<ResolvedQuery<'a>> {
        let store = self.store();
        match query {
            Query::Item(id) => {
                let slot = store
                    .slot_of(id)
                    .ok_or_else(|| ForestError::UnknownIdentifier { id: id.to_string() })?;
                Ok(ResolvedQuery {
                    vector: store.row(slot),
                    norm: store.norm(slot),
                    exclude: Some(slot),
                })
            }
            Query::Slot(slot) => {
                let vector = store
                    .vector_at(slot)
                    .ok_or_else(|| ForestError::UnknownIdentifier {
                        id: format!("#{}", slot),
                    })?;
                Ok(ResolvedQuery {
                    vector,
                    norm: store.norm(slot),
                    exclude: Some(slot),
                })
            }
            Query::Vector(vector) => {
                let norm = store.validate(vector)?;
                Ok(ResolvedQuery {
                    vector,
                    norm,
                    exclude: None,
                })
            }
        }
    }

    /// Distinct candidate slots in exploration order.
    ///
    /// `tie_slot` decides routing when the query lies exactly on a plane, so a
    /// self-query follows the same path its slot took during construction.
    pub(crate) fn collect_candidates(&self, routing: &[f32], tie_slot: Slot, budget: usize) -> Vec<Slot> {
        let mut frontier = Frontier::new();
        for tree in 0..self.trees().len() {
            frontier.push(f32::INFINITY, tree as u32, ROOT);
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        while found.len() < budget {
            let Some(pending) = frontier.pop() else {
                break;
            };
            let tree = &self.trees()[pending.tree as usize];
            let mut node = pending.node;
            let mut priority = pending.priority;

            loop {
                match tree.node(node) {
                    Node::Leaf { slots } => {
                        for &slot in slots {
                            if seen.insert(slot) {
                                found.push(slot);
                            }
                        }
                        break;
                    }
                    Node::Internal { split, left, right } => {
                        let margin = split.margin(routing);
                        let (near, far) = match side_for_margin(margin, tie_slot) {
                            Side::Left => (*left, *right),
                            Side::Right => (*right, *left),
                        };
                        frontier.push(priority.min(-margin.abs()), pending.tree, far);
                        priority = priority.min(margin.abs());
                        node = near;
                    }
                }
            }
        }

        found
    }
}

impl ResolvedQuery<'_> {
    /// Angular splits are scale-free, but margins are only comparable across
    /// queries once the query is unit length.
    fn routing_vector(&self, metric: Metric) -> Cow<'_, [f32]> {
        match metric {
            Metric::Angular if self.norm > 0.0 => {
                Cow::Owned(
                    self.vector
                        .iter()
                        .map(|&x| (x as f64 / self.norm) as f32)
                        .collect(),
                )
            }
            _ => Cow::Borrowed(self.vector),
        }
    }
}
