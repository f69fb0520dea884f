//! Owned embedding vector used at the crate boundary

use crate::error::{Result, ForestError};
use std::str::FromStr;

/// An embedding in D-dimensional space, as supplied by a catalog or a caller.
///
/// Inside a built index vectors live in the contiguous table of
/// [`VectorStore`](crate::store::VectorStore); this type only carries them in
/// and out.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Rejects NaN and infinite components.
pub(crate) fn check_finite(values: &[f32]) -> Result<()> {
    match values.iter().position(|x| !x.is_finite()) {
        Some(pos) => Err(ForestError::DegenerateVector {
            reason: format!("component {} is not finite", pos),
        }),
        None => Ok(()),
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Parses a comma-separated list such as `"0.1, 0.2, 0.3"`.
impl FromStr for Vector {
    type Err = ForestError;

    fn from_str(s: &str) -> Result<Self> {
        let data = s
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| ForestError::DegenerateVector {
                        reason: format!("invalid float: {:?}", x.trim()),
                    })
            })
            .collect::<Result<Vec<f32>>>()?;
        Ok(Vector::new(data))
    }
}
