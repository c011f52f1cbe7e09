//! Similarity functions for embedding comparison
//!
//! Retrieval ranks records by the cosine of the angle between the query
//! embedding and each stored embedding.

use crate::error::{EmbedStoreError, Result};

/// Cosine similarity: dot(x, y) / (||x|| * ||y||)
///
/// Range: [-1, 1], where 1 = same direction, -1 = opposite. Defined only
/// for equal-length vectors; fails with `DimensionMismatch` otherwise.
/// If either vector has zero norm the result is 0.0 by convention rather
/// than a division error.
pub fn cosine_similarity(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(EmbedStoreError::DimensionMismatch {
            left: x.len(),
            right: y.len(),
        });
    }

    let dot = dot_product(x, y);
    let norm_x = norm(x);
    let norm_y = norm(y);

    if norm_x == 0.0 || norm_y == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_x * norm_y))
}

/// Dot product of two vectors
#[inline]
pub fn dot_product(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// L2 norm (magnitude) of a vector
#[inline]
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|a| a * a).sum::<f64>().sqrt()
}
