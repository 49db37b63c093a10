//! Per-item feature matrices.
//!
//! The catalog carries three row-aligned matrices: a text embedding, an
//! encoded categorical (genre) block and a scaled numeric block. Row `i` of
//! each matrix describes item `i`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Dense row-major `f32` matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    /// Fails on a shape mismatch or any NaN / infinite value.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(Error::Configuration(format!(
                "matrix buffer holds {} values, shape is {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        if let Some(pos) = data.iter().position(|x| !x.is_finite()) {
            return Err(Error::Configuration(format!(
                "non-finite value {} at row {}, column {}",
                data[pos],
                pos / cols,
                pos % cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from equally sized rows
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::Configuration(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        if idx >= self.rows {
            return None;
        }
        let start = idx * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Borrowed view of one item's three feature rows
#[derive(Debug, Clone, Copy)]
pub struct FeatureRow<'a> {
    pub embedding: &'a [f32],
    pub categorical: &'a [f32],
    pub numeric: &'a [f32],
}

/// Column counts of the three feature groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDims {
    pub embedding: usize,
    pub categorical: usize,
    pub numeric: usize,
}

impl FeatureDims {
    /// Dimension of the fused vector
    #[inline]
    pub fn fused(&self) -> usize {
        self.embedding + self.categorical + self.numeric
    }
}

/// The three aligned feature matrices, immutable once loaded
#[derive(Debug, Clone)]
pub struct FeatureStore {
    embedding: FeatureMatrix,
    categorical: FeatureMatrix,
    numeric: FeatureMatrix,
}

impl FeatureStore {
    /// Fails when the matrices disagree on the number of items.
    pub fn new(
        embedding: FeatureMatrix,
        categorical: FeatureMatrix,
        numeric: FeatureMatrix,
    ) -> Result<Self> {
        let n = embedding.rows();
        if categorical.rows() != n || numeric.rows() != n {
            return Err(Error::Configuration(format!(
                "feature matrices are not row-aligned: embedding={}, categorical={}, numeric={}",
                n,
                categorical.rows(),
                numeric.rows()
            )));
        }
        Ok(Self {
            embedding,
            categorical,
            numeric,
        })
    }

    #[inline]
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.embedding.rows()
    }

    #[inline]
    pub fn dims(&self) -> FeatureDims {
        FeatureDims {
            embedding: self.embedding.cols(),
            categorical: self.categorical.cols(),
            numeric: self.numeric.cols(),
        }
    }

    pub fn embedding(&self) -> &FeatureMatrix {
        &self.embedding
    }

    pub fn categorical(&self) -> &FeatureMatrix {
        &self.categorical
    }

    pub fn numeric(&self) -> &FeatureMatrix {
        &self.numeric
    }

    pub fn row(&self, id: usize) -> Result<FeatureRow<'_>> {
        match (
            self.embedding.row(id),
            self.categorical.row(id),
            self.numeric.row(id),
        ) {
            (Some(embedding), Some(categorical), Some(numeric)) => Ok(FeatureRow {
                embedding,
                categorical,
                numeric,
            }),
            _ => Err(Error::InvariantViolation(format!(
                "item id {} out of range for {} feature rows",
                id,
                self.total_items()
            ))),
        }
    }
}
