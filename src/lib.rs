//! # cinesim
//!
//! Content-based movie recommendations over fused feature vectors.
//!
//! Each movie is described by a sentence embedding, a one-hot categorical
//! block, and scaled numeric attributes. The three groups are weighted,
//! concatenated and L2-normalized, then indexed for cosine nearest-neighbor
//! lookup. A query by title returns the closest other movies.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! cinesim --data-dir ./data build-index --kind hnsw
//! cinesim --data-dir ./data serve --port 8000
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use cinesim::prelude::*;
//!
//! let loader = CatalogLoader::new(DataPaths::from_data_dir("./data"), FusionWeights::default());
//! let engine = loader.load().unwrap();
//! if let Some(recs) = engine.recommend("The Matrix", 5).unwrap() {
//!     for rec in recs {
//!         println!("{} ({:.3})", rec.title, rec.distance);
//!     }
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `cinesim-core` - fusion, title registry, exact and HNSW indexes, engine, recall
//! - `cinesim-storage` - `.npy`/CSV/JSON readers, index blob persistence
//! - `cinesim-api` - REST API

// Re-export core types
pub use cinesim_core::{
    AnnIndex, Error, FeatureFusion, FeatureMatrix, FeatureStore, FusedMatrix, FusionWeights,
    HnswIndex, HnswParams, IndexConfig, IndexKind, RecallEvaluator, Recommendation,
    RecommendationEngine, Result, TitleRegistry, Vector,
};

// Re-export storage
pub use cinesim_storage::{CatalogLoader, DataPaths, IndexBuilder};

// Re-export API
pub use cinesim_api::{RestApi, ServerSettings};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CatalogLoader, DataPaths, Error, FeatureFusion, FusionWeights, HnswParams, IndexBuilder,
        IndexConfig, IndexKind, RecallEvaluator, Recommendation, RecommendationEngine, Result,
        RestApi, ServerSettings, TitleRegistry,
    };
}

/// SIMD-optimized vector operations
pub mod simd {
    pub use cinesim_core::simd::{cosine_similarity_simd, dot_product_simd, norm_simd};
}
