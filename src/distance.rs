//! Distance metrics over raw `f32` slices

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance metrics supported by the index.
///
/// The numeric id is what the persisted header stores; never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `sqrt(2 - 2 * cos)`: the Euclidean distance between unit-normalized vectors.
    #[default]
    Angular,
    /// Euclidean (L2) distance.
    Euclidean,
}

impl Metric {
    pub fn id(self) -> u8 {
        match self {
            Metric::Angular => 0,
            Metric::Euclidean => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Metric> {
        match id {
            0 => Some(Metric::Angular),
            1 => Some(Metric::Euclidean),
            _ => None,
        }
    }

    /// Distance between two vectors whose L2 norms are already known.
    ///
    /// Norms are ignored for Euclidean; for Angular both must be non-zero.
    /// Products are formed in f64 so neither tiny nor huge components
    /// underflow or overflow the cosine.
    #[inline]
    pub fn distance_with_norms(self, a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f32 {
        match self {
            Metric::Angular => angular_from_cosine(dot_product(a, b) / (norm_a * norm_b)),
            Metric::Euclidean => euclidean_distance(a, b),
        }
    }

    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        self.distance_with_norms(a, l2_norm(a), b, l2_norm(b))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Angular => write!(f, "angular"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Dot product accumulated in f64.
///
/// Squares of any finite f32 stay inside f64's normal range, so sums never
/// underflow to zero or overflow to infinity.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}

/// L2 norm in f64. Zero only when every component is exactly zero.
#[inline]
pub fn l2_norm(a: &[f32]) -> f64 {
    dot_product(a, a).sqrt()
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Maps a cosine similarity onto the angular metric.
#[inline]
pub fn angular_from_cosine(cosine: f64) -> f32 {
    // Clamp to [-1, 1] to absorb floating point drift
    let cosine = cosine.clamp(-1.0, 1.0);
    (2.0 - 2.0 * cosine).max(0.0).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_euclidean_distance() {
        let dist = euclidean_distance(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_relative_eq!(dist, 5.196152, epsilon = 1e-5);
    }

    #[test]
    fn test_dot_product() {
        assert_relative_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }

    #[test]
    fn test_angular_identical() {
        let dist = Metric::Angular.distance(&[1.0, 0.0, 0.0], &[2.0, 0.0, 0.0]);
        assert_relative_eq!(dist, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_angular_orthogonal() {
        let dist = Metric::Angular.distance(&[1.0, 0.0], &[0.0, 3.0]);
        assert_relative_eq!(dist, 2.0f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_angular_opposite() {
        let dist = Metric::Angular.distance(&[1.0, 0.0], &[-1.0, 0.0]);
        assert_relative_eq!(dist, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_angular_is_symmetric() {
        let a = [0.3, -1.2, 4.0];
        let b = [2.0, 0.5, -0.7];
        assert_eq!(Metric::Angular.distance(&a, &b), Metric::Angular.distance(&b, &a));
    }

    #[test]
    fn test_angular_tiny_components() {
        let dist = Metric::Angular.distance(&[1e-30, 1e-30], &[2e-30, 2e-30]);
        assert_relative_eq!(dist, 0.0, epsilon = 1e-6);
        assert!(l2_norm(&[1e-30, 1e-30]) > 0.0);
        assert!(l2_norm(&[f32::from_bits(1)]) > 0.0);
    }

    #[test]
    fn test_angular_huge_components() {
        let dist = Metric::Angular.distance(&[1e20, 1e20], &[1.0, 1.0]);
        assert_relative_eq!(dist, 0.0, epsilon = 1e-6);
        let dist = Metric::Angular.distance(&[3e38, 0.0], &[0.0, 3e38]);
        assert_relative_eq!(dist, 2.0f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_euclidean_huge_components() {
        assert_relative_eq!(euclidean_distance(&[1e20, 0.0], &[0.0, 0.0]), 1e20, max_relative = 1e-6);
    }

    #[test]
    fn test_metric_ids() {
        for metric in [Metric::Angular, Metric::Euclidean] {
            assert_eq!(Metric::from_id(metric.id()), Some(metric));
        }
        assert_eq!(Metric::from_id(9), None);
    }
}
