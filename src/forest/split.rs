//! Hyperplane splits used by internal tree nodes.

use crate::distance::{dot_product, l2_norm, Metric};
use crate::store::Slot;

/// Which child of an internal node a vector is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Tie rule for vectors lying exactly on the plane: even slots go left.
    pub fn for_tie(slot: Slot) -> Side {
        if slot % 2 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// A splitting hyperplane `normal . v + offset = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub normal: Vec<f32>,
    pub offset: f32,
}

impl Split {
    /// Plane separating two pivot vectors.
    ///
    /// Angular: through the origin, normal along the difference of the
    /// unit-normalized pivots. Euclidean: the perpendicular bisector of the
    /// pivots. A zero normal (identical pivots) is kept unnormalized, so every
    /// margin is 0 and the tie rule decides.
    pub fn from_pivots(metric: Metric, a: &[f32], b: &[f32]) -> Split {
        match metric {
            Metric::Angular => {
                let (na, nb) = (l2_norm(a), l2_norm(b));
                let normal = unit(
                    a.iter()
                        .zip(b)
                        .map(|(&x, &y)| x as f64 / na - y as f64 / nb)
                        .collect(),
                );
                Split {
                    normal: narrow(&normal),
                    offset: 0.0,
                }
            }
            Metric::Euclidean => {
                let normal = unit(
                    a.iter()
                        .zip(b)
                        .map(|(&x, &y)| x as f64 - y as f64)
                        .collect(),
                );
                let midpoint_dot: f64 = normal
                    .iter()
                    .zip(a.iter().zip(b))
                    .map(|(n, (&x, &y))| n * (x as f64 + y as f64) * 0.5)
                    .sum();
                Split {
                    normal: narrow(&normal),
                    offset: -midpoint_dot as f32,
                }
            }
        }
    }

    /// Signed distance-like score of `v` relative to the plane.
    #[inline]
    pub fn margin(&self, v: &[f32]) -> f32 {
        (dot_product(&self.normal, v) + self.offset as f64) as f32
    }

    /// Routing for a stored vector during construction.
    pub fn side_of(&self, v: &[f32], slot: Slot) -> Side {
        side_for_margin(self.margin(v), slot)
    }
}

pub(crate) fn side_for_margin(margin: f32, slot: Slot) -> Side {
    if margin > 0.0 {
        Side::Right
    } else if margin < 0.0 {
        Side::Left
    } else {
        Side::for_tie(slot)
    }
}

/// Scale to unit length; a zero vector is returned as is.
fn unit(mut v: Vec<f64>) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

fn narrow(v: &[f64]) -> Vec<f32> {
    v.iter().map(|&x| x as f32).collect()
}
