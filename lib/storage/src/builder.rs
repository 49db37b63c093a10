//! Offline index build: fuse the whole catalog with the serving weights and
//! persist the index blob.

use crate::blob::save_index;
use crate::loader::load_feature_store;
use crate::paths::DataPaths;
use anyhow::Context;
use cinesim_core::{
    AnnIndex, Error, FeatureFusion, FusionWeights, IndexConfig, IndexKind, Result,
    SimilarityIndex,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// What a build produced
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub kind: IndexKind,
    pub items: usize,
    pub dimension: usize,
    pub bytes: u64,
    pub path: PathBuf,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct IndexBuilder {
    paths: DataPaths,
    weights: FusionWeights,
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(paths: DataPaths, weights: FusionWeights, config: IndexConfig) -> Self {
        Self {
            paths,
            weights,
            config,
        }
    }

    pub fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        self.weights.validate()?;

        let store = load_feature_store(&self.paths)?;
        let fused = FeatureFusion::new(self.weights).fuse_store(&store)?;
        info!(
            "Fused {} items into {}-dimensional vectors (weights {:?})",
            fused.len(),
            fused.dim(),
            self.weights
        );

        let index = SimilarityIndex::build(&fused, &self.config);
        let bytes = save_index(&self.paths.index, &index, self.weights)
            .context("saving similarity index")
            .map_err(|e| Error::Storage(format!("{:#}", e)))?;

        let report = BuildReport {
            kind: index.kind(),
            items: index.len(),
            dimension: index.dim(),
            bytes,
            path: self.paths.index.clone(),
            elapsed: started.elapsed(),
        };
        info!(
            "{} index saved to {:?} ({} bytes, {:.2?})",
            report.kind, report.path, report.bytes, report.elapsed
        );
        Ok(report)
    }
}
