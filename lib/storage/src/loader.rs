//! Start-up sequence: read every artifact, cross-check them, hand back a
//! ready engine. Any failure is a configuration error and nothing is served.

use crate::blob::load_index;
use crate::delimited::read_numeric_csv;
use crate::mapping::read_title_mapping;
use crate::npy::read_npy;
use crate::paths::DataPaths;
use anyhow::Context;
use cinesim_core::{
    AnnIndex, Error, FeatureFusion, FeatureMatrix, FeatureStore, FusionWeights,
    RecommendationEngine, Result, TitleRegistry,
};
use std::path::Path;
use std::time::Instant;
use tracing::info;

const WEIGHT_TOLERANCE: f32 = 1e-6;

/// Read a matrix, choosing the codec by file extension
pub fn read_matrix(path: &Path) -> anyhow::Result<FeatureMatrix> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_numeric_csv(path),
        _ => read_npy(path),
    }
}

/// Load the three feature matrices into a store
pub fn load_feature_store(paths: &DataPaths) -> Result<FeatureStore> {
    let embedding = read_matrix(&paths.embeddings).map_err(configuration)?;
    let categorical = read_matrix(&paths.categorical).map_err(configuration)?;
    let numeric = read_matrix(&paths.numeric).map_err(configuration)?;
    info!(
        "Feature matrices: embedding {}x{}, categorical {}x{}, numeric {}x{}",
        embedding.rows(),
        embedding.cols(),
        categorical.rows(),
        categorical.cols(),
        numeric.rows(),
        numeric.cols()
    );
    FeatureStore::new(embedding, categorical, numeric)
}

pub fn load_titles(paths: &DataPaths) -> Result<TitleRegistry> {
    let titles = read_title_mapping(&paths.titles).map_err(configuration)?;
    info!(
        "Loaded {} titles ({} duplicate keys, last write kept)",
        titles.len(),
        titles.collisions()
    );
    Ok(titles)
}

fn configuration(err: anyhow::Error) -> Error {
    Error::Configuration(format!("{:#}", err))
}

/// Loads a [`RecommendationEngine`] from a [`DataPaths`] layout
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    paths: DataPaths,
    weights: FusionWeights,
}

impl CatalogLoader {
    pub fn new(paths: DataPaths, weights: FusionWeights) -> Self {
        Self { paths, weights }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Blocking; call before accepting any query.
    pub fn load(&self) -> Result<RecommendationEngine> {
        let started = Instant::now();
        self.weights.validate()?;
        info!("Loading movie recommender from {:?}", self.paths);

        let store = load_feature_store(&self.paths)?;
        let titles = load_titles(&self.paths)?;

        let (header, index) = load_index(&self.paths.index)
            .context("loading similarity index")
            .map_err(configuration)?;
        if !weights_match(header.weights, self.weights) {
            return Err(Error::Configuration(format!(
                "index was built with weights {:?} but the server is configured with {:?}",
                header.weights, self.weights
            )));
        }
        info!(
            "Loaded {} index: {} items, dimension {}",
            header.kind,
            index.len(),
            index.dim()
        );

        let engine = RecommendationEngine::new(
            store,
            titles,
            FeatureFusion::new(self.weights),
            Box::new(index),
        )?;
        info!(
            "Movie recommender loaded: {} movies in {:.2?}",
            engine.total_items(),
            started.elapsed()
        );
        Ok(engine)
    }
}

fn weights_match(a: FusionWeights, b: FusionWeights) -> bool {
    (a.embedding - b.embedding).abs() <= WEIGHT_TOLERANCE
        && (a.categorical - b.categorical).abs() <= WEIGHT_TOLERANCE
        && (a.numeric - b.numeric).abs() <= WEIGHT_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use crate::mapping::write_title_mapping;
    use crate::npy::write_npy;
    use cinesim_core::IndexConfig;

    fn write_catalog(dir: &Path, numeric_rows: usize) -> DataPaths {
        let paths = DataPaths::from_data_dir(dir);
        std::fs::create_dir_all(paths.embeddings.parent().unwrap()).unwrap();
        std::fs::create_dir_all(paths.titles.parent().unwrap()).unwrap();

        let embedding =
            FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.7, 0.7], vec![0.0, 1.0]]).unwrap();
        write_npy(&paths.embeddings, &embedding).unwrap();
        std::fs::write(&paths.categorical, "Action,Drama\nTrue,False\nTrue,True\nFalse,True\n").unwrap();
        let numeric = FeatureMatrix::from_rows(vec![vec![0.5]; numeric_rows]).unwrap();
        write_npy(&paths.numeric, &numeric).unwrap();
        write_title_mapping(&paths.titles, &[("Heat", 0usize), ("Ronin", 1), ("Amelie", 2)]).unwrap();
        paths
    }

    #[test]
    fn test_load_ready_engine() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_catalog(dir.path(), 3);
        IndexBuilder::new(paths.clone(), FusionWeights::default(), IndexConfig::exact())
            .build()
            .unwrap();

        let engine = CatalogLoader::new(paths, FusionWeights::default()).load().unwrap();
        assert_eq!(engine.total_items(), 3);
        let recs = engine.recommend("heat", 1).unwrap().unwrap();
        assert_eq!(recs[0].title, "Ronin");
    }

    #[test]
    fn test_row_mismatch_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_catalog(dir.path(), 2);
        let err = load_feature_store(&paths).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_missing_index_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_catalog(dir.path(), 3);
        let err = CatalogLoader::new(paths, FusionWeights::default()).load().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_weight_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_catalog(dir.path(), 3);
        IndexBuilder::new(paths.clone(), FusionWeights::default(), IndexConfig::exact())
            .build()
            .unwrap();

        let other = FusionWeights::new(1.0, 0.0, 0.0).unwrap();
        let err = CatalogLoader::new(paths, other).load().unwrap_err();
        assert!(err.to_string().contains("weights"));
    }
}
