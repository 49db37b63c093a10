//! # cinesim Core
//!
//! Core library for the cinesim movie recommender.
//!
//! - [`FeatureStore`] - the three row-aligned feature matrices of the catalog
//! - [`TitleRegistry`] - normalized title lookup and substring search
//! - [`FeatureFusion`] - weighted, concatenated, unit-normalized item vectors
//! - [`AnnIndex`] - k-NN capability, backed by [`ExactIndex`] or [`HnswIndex`]
//! - [`RecommendationEngine`] - title in, `k` most similar titles out
//! - [`RecallEvaluator`] - recall@k of the index against an exact scan
//!
//! ## Example
//!
//! ```rust
//! use cinesim_core::{
//!     FeatureFusion, FeatureMatrix, FeatureStore, IndexConfig, RecommendationEngine,
//!     TitleRegistry,
//! };
//!
//! let store = FeatureStore::new(
//!     FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.8, 0.2], vec![0.0, 1.0]]).unwrap(),
//!     FeatureMatrix::from_rows(vec![vec![1.0], vec![1.0], vec![0.0]]).unwrap(),
//!     FeatureMatrix::from_rows(vec![vec![0.1], vec![0.2], vec![0.9]]).unwrap(),
//! )
//! .unwrap();
//! let titles = TitleRegistry::from_pairs([("Heat", 0usize), ("Ronin", 1), ("Up", 2)]);
//!
//! let engine = RecommendationEngine::build(
//!     store,
//!     titles,
//!     FeatureFusion::default(),
//!     &IndexConfig::exact(),
//! )
//! .unwrap();
//!
//! let recs = engine.recommend("  heat ", 1).unwrap().unwrap();
//! assert_eq!(recs[0].title, "Ronin");
//! ```

pub mod ann;
pub mod engine;
pub mod error;
pub mod exact;
pub mod features;
pub mod fusion;
pub mod hnsw;
pub mod recall;
pub mod titles;
pub mod vector;

/// SIMD-optimized vector operations
///
/// - AVX2/FMA on x86_64
/// - NEON on ARM64/Apple Silicon
pub mod simd;

pub use ann::{AnnIndex, IndexConfig, IndexKind, Neighbor, SimilarityIndex};
pub use engine::{EngineStats, Recommendation, RecommendationEngine};
pub use error::{Error, Result};
pub use exact::ExactIndex;
pub use features::{FeatureDims, FeatureMatrix, FeatureRow, FeatureStore};
pub use fusion::{FeatureFusion, FusedMatrix, FusionWeights};
pub use hnsw::{HnswIndex, HnswParams};
pub use recall::{RecallEvaluator, RecallReport, RecallSummary};
pub use titles::{normalize, TitleRegistry};
pub use vector::Vector;
