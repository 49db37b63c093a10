//! Nearest-neighbor index capability.
//!
//! The engine only relies on the contract below: `query` returns at most `k`
//! neighbors sorted by ascending cosine distance (`1 - cos`), lower meaning
//! more similar. Whether the backend is exact or approximate is its own
//! business.

use crate::exact::ExactIndex;
use crate::fusion::FusedMatrix;
use crate::hnsw::{HnswIndex, HnswParams};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One hit of a k-NN query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Read-only k-NN index over fused vectors
pub trait AnnIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Number of indexed items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dim(&self) -> usize;

    /// Up to `k` neighbors of `vector`, ascending by distance.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Exact,
    #[default]
    Hnsw,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Exact => write!(f, "exact"),
            IndexKind::Hnsw => write!(f, "hnsw"),
        }
    }
}

impl std::str::FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" | "flat" | "brute-force" => Ok(IndexKind::Exact),
            "hnsw" | "ann" => Ok(IndexKind::Hnsw),
            other => Err(format!("unknown index kind: {}", other)),
        }
    }
}

/// Build-time choice of backend
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub hnsw: HnswParams,
}

impl IndexConfig {
    pub fn exact() -> Self {
        Self {
            kind: IndexKind::Exact,
            hnsw: HnswParams::default(),
        }
    }

    pub fn hnsw(params: HnswParams) -> Self {
        Self {
            kind: IndexKind::Hnsw,
            hnsw: params,
        }
    }
}

/// Serializable index of either backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SimilarityIndex {
    Exact(ExactIndex),
    Hnsw(HnswIndex),
}

impl SimilarityIndex {
    pub fn build(matrix: &FusedMatrix, config: &IndexConfig) -> Self {
        match config.kind {
            IndexKind::Exact => SimilarityIndex::Exact(ExactIndex::build(matrix)),
            IndexKind::Hnsw => SimilarityIndex::Hnsw(HnswIndex::build(matrix, config.hnsw)),
        }
    }

    fn inner(&self) -> &dyn AnnIndex {
        match self {
            SimilarityIndex::Exact(index) => index,
            SimilarityIndex::Hnsw(index) => index,
        }
    }
}

impl AnnIndex for SimilarityIndex {
    fn kind(&self) -> IndexKind {
        self.inner().kind()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn dim(&self) -> usize {
        self.inner().dim()
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.inner().query(vector, k)
    }
}

/// Cosine distance between unit vectors, clamped against float error.
#[inline]
pub(crate) fn cosine_distance(similarity: f32) -> f32 {
    (1.0 - similarity).max(0.0)
}
