//! Immutable vector store: a dense slot table plus the item-id mapping

use crate::distance::{l2_norm, Metric};
use crate::error::{ForestError, Result};
use crate::vector::{check_finite, Vector};
use std::collections::HashMap;

/// Dense position of a vector inside the store, `0..len()`.
pub type Slot = u32;

/// Read-only, contiguous collection of fixed-dimension vectors.
///
/// Vectors are laid out row-major in one `Vec<f32>` so the persistence layer
/// can dump and restore the table directly. Norms are cached per slot and
/// recomputed on load.
#[derive(Debug)]
pub struct VectorStore {
    metric: Metric,
    dimension: usize,
    data: Vec<f32>,
    norms: Vec<f64>,
    /// Slot -> item id
    ids: Vec<String>,
    /// Item id -> slot
    slots: HashMap<String, Slot>,
}

impl VectorStore {
    /// Build a store from `(item_id, vector)` pairs; slots follow input order.
    pub fn create<I, S>(metric: Metric, vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vector)>,
        S: Into<String>,
    {
        let mut iter = vectors.into_iter().peekable();
        let dimension = match iter.peek() {
            Some((_, first)) => first.dimension(),
            None => return Err(ForestError::EmptyStore),
        };
        let mut store = Self::empty(metric, dimension, iter.size_hint().0)?;
        for (id, vector) in iter {
            store.push(id.into(), vector.as_slice())?;
        }
        Ok(store)
    }

    /// Rebuild a store from a decoded vector table and identifier list.
    pub(crate) fn from_parts(
        metric: Metric,
        dimension: usize,
        data: Vec<f32>,
        ids: Vec<String>,
    ) -> Result<Self> {
        if dimension == 0 || data.len() != dimension * ids.len() {
            return Err(ForestError::corrupt(format!(
                "vector table holds {} floats, expected {} x {}",
                data.len(),
                ids.len(),
                dimension
            )));
        }
        let mut store = Self::empty(metric, dimension, ids.len())?;
        for (id, row) in ids.into_iter().zip(data.chunks_exact(dimension)) {
            store
                .push(id, row)
                .map_err(|e| ForestError::corrupt(e.to_string()))?;
        }
        Ok(store)
    }

    fn empty(metric: Metric, dimension: usize, capacity: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ForestError::DegenerateVector {
                reason: "vectors must have at least one component".to_string(),
            });
        }
        Ok(Self {
            metric,
            dimension,
            data: Vec::with_capacity(capacity * dimension),
            norms: Vec::with_capacity(capacity),
            ids: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
        })
    }

    fn push(&mut self, id: String, row: &[f32]) -> Result<()> {
        let norm = self.validate(row)?;
        if self.slots.contains_key(&id) {
            return Err(ForestError::DuplicateIdentifier { id });
        }
        if u32::try_from(id.len()).is_err() {
            return Err(ForestError::InvalidParameter(format!(
                "item id of {} bytes is too long",
                id.len()
            )));
        }
        let slot = Slot::try_from(self.ids.len()).map_err(|_| {
            ForestError::InvalidParameter("too many vectors for 32-bit slots".to_string())
        })?;

        self.data.extend_from_slice(row);
        self.norms.push(norm);
        self.slots.insert(id.clone(), slot);
        self.ids.push(id);
        Ok(())
    }

    /// Check a vector against this store's dimension and metric, returning its norm.
    pub fn validate(&self, vector: &[f32]) -> Result<f64> {
        if vector.len() != self.dimension {
            return Err(ForestError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        check_finite(vector)?;
        let norm = l2_norm(vector);
        if self.metric == Metric::Angular && norm == 0.0 {
            return Err(ForestError::DegenerateVector {
                reason: "zero-length vector has no direction".to_string(),
            });
        }
        Ok(norm)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn slot_of(&self, id: &str) -> Option<Slot> {
        self.slots.get(id).copied()
    }

    pub fn identifier_of(&self, slot: Slot) -> Option<&str> {
        self.ids.get(slot as usize).map(String::as_str)
    }

    pub fn vector_at(&self, slot: Slot) -> Option<&[f32]> {
        if (slot as usize) < self.len() {
            Some(self.row(slot))
        } else {
            None
        }
    }

    /// Distance between two stored vectors.
    pub fn distance(&self, a: Slot, b: Slot) -> f32 {
        self.metric
            .distance_with_norms(self.row(a), self.norm(a), self.row(b), self.norm(b))
    }

    /// Distance from an already validated query vector to a stored one.
    #[inline]
    pub(crate) fn distance_to(&self, query: &[f32], query_norm: f64, slot: Slot) -> f32 {
        self.metric
            .distance_with_norms(query, query_norm, self.row(slot), self.norm(slot))
    }

    #[inline]
    pub(crate) fn row(&self, slot: Slot) -> &[f32] {
        let start = slot as usize * self.dimension;
        &self.data[start..start + self.dimension]
    }

    #[inline]
    pub(crate) fn norm(&self, slot: Slot) -> f64 {
        self.norms[slot as usize]
    }

    /// The whole vector table, row-major in slot order.
    pub(crate) fn raw_data(&self) -> &[f32] {
        &self.data
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
