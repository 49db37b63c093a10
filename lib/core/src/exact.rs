//! Brute-force index: scores every row, recall is always 1.0.

use crate::ann::{cosine_distance, AnnIndex, IndexKind, Neighbor};
use crate::fusion::FusedMatrix;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactIndex {
    matrix: FusedMatrix,
}

impl ExactIndex {
    pub fn build(matrix: &FusedMatrix) -> Self {
        Self {
            matrix: matrix.clone(),
        }
    }

    pub fn matrix(&self) -> &FusedMatrix {
        &self.matrix
    }
}

impl AnnIndex for ExactIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Exact
    }

    fn len(&self) -> usize {
        self.matrix.len()
    }

    fn dim(&self) -> usize {
        self.matrix.dim()
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.matrix.dim() {
            return Err(Error::InvalidDimension {
                expected: self.matrix.dim(),
                actual: vector.len(),
            });
        }
        Ok(rank_by_similarity(&self.matrix, vector)
            .into_iter()
            .take(k)
            .map(|(id, similarity)| Neighbor {
                id,
                distance: cosine_distance(similarity),
            })
            .collect())
    }
}

/// Cosine similarity of `query` against every row, sorted descending.
/// Ties go to the lower id so repeated runs agree.
pub fn rank_by_similarity(matrix: &FusedMatrix, query: &[f32]) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = matrix
        .iter_rows()
        .enumerate()
        .map(|(id, row)| (id, crate::simd::cosine_similarity_simd(query, row)))
        .collect();
    scored.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored
}
