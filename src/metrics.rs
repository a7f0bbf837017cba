use hnsw::Hnsw;
use rand_pcg::Pcg64;
use space::Metric as SpaceMetric;

use crate::error::{Error, Result};

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scales `v` to unit length in place. Returns false (leaving `v` untouched)
/// when the norm is zero or not finite.
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm < f32::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Checks dimension, finiteness and unit norm within `epsilon`.
pub fn check_unit(v: &[f32], dim: usize, epsilon: f32) -> Result<()> {
    if v.len() != dim {
        return Err(Error::dimension(dim, v.len()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidVector("non-finite component".into()));
    }
    let norm = l2_norm(v);
    if (norm - 1.0).abs() > epsilon {
        return Err(Error::InvalidVector(format!("norm {norm} is not 1")));
    }
    Ok(())
}

/// Inner product of unit vectors, clamped to [-1, 1].
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b).clamp(-1.0, 1.0)
}

/// `1 - <a, b>` encoded as ordered f32 bits for the HNSW graph.
#[derive(Clone, Copy)]
pub struct InnerProductMetric;

impl SpaceMetric<Vec<f32>> for InnerProductMetric {
    type Unit = u32;
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> Self::Unit {
        let dist = 1.0 - dot(a, b);
        // non-negative floats order the same as their bit patterns
        let dist: f32 = if dist > 0.0 { dist } else { 0.0 };
        dist.to_bits()
    }
}

pub type Graph<const M: usize, const M0: usize> =
    Hnsw<InnerProductMetric, Vec<f32>, Pcg64, M, M0>;
