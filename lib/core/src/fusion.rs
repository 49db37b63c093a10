//! Weighted feature fusion.
//!
//! Each feature group is scaled by its weight, the groups are concatenated in
//! the fixed order (embedding, categorical, numeric) and the result is scaled
//! to unit length. Normalization happens once, after concatenation, so the
//! weights set each group's share of the fused direction. The offline index
//! build and the query path must go through the same code.

use crate::features::{FeatureRow, FeatureStore};
use crate::{Error, Result, Vector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_WEIGHT: f32 = 0.5;
pub const DEFAULT_CATEGORICAL_WEIGHT: f32 = 0.3;
pub const DEFAULT_NUMERIC_WEIGHT: f32 = 0.2;

/// Per-group weights. They are not required to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub embedding: f32,
    pub categorical: f32,
    pub numeric: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            embedding: DEFAULT_EMBEDDING_WEIGHT,
            categorical: DEFAULT_CATEGORICAL_WEIGHT,
            numeric: DEFAULT_NUMERIC_WEIGHT,
        }
    }
}

impl FusionWeights {
    pub fn new(embedding: f32, categorical: f32, numeric: f32) -> Result<Self> {
        let weights = Self {
            embedding,
            categorical,
            numeric,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("embedding", self.embedding),
            ("categorical", self.categorical),
            ("numeric", self.numeric),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Configuration(format!(
                    "{} weight must be a finite non-negative number, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}

/// Fuses the three feature rows of an item into one unit vector
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureFusion {
    weights: FusionWeights,
}

impl FeatureFusion {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    #[inline]
    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Weight, concatenate, then L2-normalize.
    ///
    /// An all-zero concatenation yields the zero vector rather than NaNs.
    pub fn fuse(&self, embedding: &[f32], categorical: &[f32], numeric: &[f32]) -> Vector {
        let mut out = vec![0.0; embedding.len() + categorical.len() + numeric.len()];
        self.fuse_into(embedding, categorical, numeric, &mut out);
        Vector::new(out)
    }

    #[inline]
    pub fn fuse_row(&self, row: FeatureRow<'_>) -> Vector {
        self.fuse(row.embedding, row.categorical, row.numeric)
    }

    fn fuse_into(&self, embedding: &[f32], categorical: &[f32], numeric: &[f32], out: &mut [f32]) {
        debug_assert_eq!(out.len(), embedding.len() + categorical.len() + numeric.len());

        let (out_embedding, rest) = out.split_at_mut(embedding.len());
        let (out_categorical, out_numeric) = rest.split_at_mut(categorical.len());
        scale_into(embedding, self.weights.embedding, out_embedding);
        scale_into(categorical, self.weights.categorical, out_categorical);
        scale_into(numeric, self.weights.numeric, out_numeric);

        let norm = crate::simd::norm_simd(out);
        if norm > 0.0 {
            let inv_norm = 1.0 / norm;
            out.iter_mut().for_each(|x| *x *= inv_norm);
        } else {
            out.fill(0.0);
        }
    }

    /// Fuse every item of the store, in parallel, into an N x D matrix.
    pub fn fuse_store(&self, store: &FeatureStore) -> Result<FusedMatrix> {
        let dim = store.dims().fused();
        let n = store.total_items();
        let mut data = vec![0.0f32; n * dim];

        if dim > 0 {
            data.par_chunks_mut(dim)
                .enumerate()
                .try_for_each(|(id, out)| -> Result<()> {
                    let row = store.row(id)?;
                    self.fuse_into(row.embedding, row.categorical, row.numeric, out);
                    Ok(())
                })?;
        }

        FusedMatrix::new(dim, data)
    }
}

#[inline]
fn scale_into(src: &[f32], weight: f32, dst: &mut [f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = s * weight;
    }
}

/// Row-major matrix of fused vectors, row `i` belongs to item `i`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl FusedMatrix {
    pub fn new(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            if !data.is_empty() {
                return Err(Error::Configuration(
                    "fused matrix with zero dimension must be empty".to_string(),
                ));
            }
        } else if data.len() % dim != 0 {
            return Err(Error::Configuration(format!(
                "fused buffer of {} values is not a multiple of dimension {}",
                data.len(),
                dim
            )));
        }
        Ok(Self { dim, data })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        if idx >= self.len() {
            return None;
        }
        let start = idx * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.dim.max(1))
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_parts(self) -> (usize, Vec<f32>) {
        (self.dim, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMatrix;

    #[test]
    fn test_fuse_is_unit_length() {
        let fusion = FeatureFusion::default();
        let v = fusion.fuse(&[0.2, -0.7, 1.3], &[1.0, 0.0], &[0.4]);
        assert_eq!(v.dim(), 6);
        assert!((v.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_weights_apply_before_normalization() {
        let fusion = FeatureFusion::default();
        let v = fusion.fuse(&[1.0], &[1.0], &[1.0]);
        // raw = [0.5, 0.3, 0.2], norm = sqrt(0.38)
        let n = 0.38f32.sqrt();
        let expected = [0.5 / n, 0.3 / n, 0.2 / n];
        for (got, want) in v.as_slice().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_groups_are_not_normalized_independently() {
        // Per-group normalization would give the embedding and the numeric
        // group equal magnitude; fusing after weighting keeps the raw scale.
        let fusion = FeatureFusion::new(FusionWeights::new(1.0, 1.0, 1.0).unwrap());
        let v = fusion.fuse(&[10.0], &[], &[1.0]);
        assert!(v.as_slice()[0] > 0.99);
        assert!(v.as_slice()[1] < 0.11);
    }

    #[test]
    fn test_zero_input_yields_zero_vector() {
        let fusion = FeatureFusion::default();
        let v = fusion.fuse(&[0.0, 0.0], &[0.0], &[0.0]);
        assert!(v.is_zero());
        assert_eq!(v.norm(), 0.0);
        assert!(v.as_slice().iter().all(|x| !x.is_nan()));
    }

    #[test]
    fn test_zero_weight_drops_group() {
        let fusion = FeatureFusion::new(FusionWeights::new(1.0, 0.0, 0.0).unwrap());
        let v = fusion.fuse(&[0.0, 2.0], &[5.0], &[7.0]);
        assert_eq!(v.as_slice(), &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(FusionWeights::new(0.5, -0.1, 0.2).is_err());
        assert!(FusionWeights::new(f32::NAN, 0.1, 0.2).is_err());
    }

    #[test]
    fn test_fuse_store_matches_row_fusion() {
        let store = FeatureStore::new(
            FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 0.0], vec![0.3, 0.4]]).unwrap(),
            FeatureMatrix::from_rows(vec![vec![1.0], vec![0.0], vec![0.0]]).unwrap(),
            FeatureMatrix::from_rows(vec![vec![0.5], vec![0.0], vec![-1.0]]).unwrap(),
        )
        .unwrap();
        let fusion = FeatureFusion::default();
        let fused = fusion.fuse_store(&store).unwrap();

        assert_eq!(fused.len(), 3);
        assert_eq!(fused.dim(), 4);
        for id in 0..3 {
            let single = fusion.fuse_row(store.row(id).unwrap());
            assert_eq!(fused.row(id).unwrap(), single.as_slice());
        }
        assert!(fused.row(1).unwrap().iter().all(|x| *x == 0.0));
    }
}
