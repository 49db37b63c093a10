//! Title-to-recommendations pipeline.
//!
//! title -> id -> three feature rows -> fused query vector -> k-NN query ->
//! self-exclusion -> (title, distance) pairs.

use crate::ann::{AnnIndex, IndexConfig, IndexKind, Neighbor, SimilarityIndex};
use crate::features::FeatureStore;
use crate::fusion::{FeatureFusion, FusionWeights};
use crate::titles::TitleRegistry;
use crate::{Error, Result, Vector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One recommended item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    /// Cosine distance to the queried item, lower is more similar
    pub distance: f32,
}

/// Summary of the loaded catalog
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_items: usize,
    pub total_titles: usize,
    pub dimension: usize,
    pub weights: FusionWeights,
    pub index_kind: IndexKind,
    pub index_size: usize,
}

/// Read-only recommendation engine.
///
/// Everything is loaded before construction and never mutated afterwards, so
/// a shared reference can serve any number of concurrent requests.
pub struct RecommendationEngine {
    store: FeatureStore,
    titles: TitleRegistry,
    fusion: FeatureFusion,
    index: Box<dyn AnnIndex>,
}

impl std::fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("total_items", &self.store.total_items())
            .field("titles", &self.titles.len())
            .field("weights", &self.fusion.weights())
            .field("index", &self.index.kind())
            .finish()
    }
}

impl RecommendationEngine {
    /// Cross-checks the artifacts; any disagreement is a configuration error.
    pub fn new(
        store: FeatureStore,
        titles: TitleRegistry,
        fusion: FeatureFusion,
        index: Box<dyn AnnIndex>,
    ) -> Result<Self> {
        let total_items = store.total_items();
        let dim = store.dims().fused();

        if titles.is_empty() {
            return Err(Error::Configuration("title mapping is empty".to_string()));
        }
        if let Some(max_id) = titles.max_id() {
            if max_id >= total_items {
                return Err(Error::Configuration(format!(
                    "title mapping references item {} but the catalog has {} items",
                    max_id, total_items
                )));
            }
        }
        if index.len() != total_items {
            return Err(Error::Configuration(format!(
                "similarity index holds {} items, feature matrices hold {}",
                index.len(),
                total_items
            )));
        }
        if index.dim() != dim {
            return Err(Error::Configuration(format!(
                "similarity index dimension {} does not match fused dimension {}",
                index.dim(),
                dim
            )));
        }

        Ok(Self {
            store,
            titles,
            fusion,
            index,
        })
    }

    /// Fuse the whole catalog and build a fresh index for it.
    pub fn build(
        store: FeatureStore,
        titles: TitleRegistry,
        fusion: FeatureFusion,
        config: &IndexConfig,
    ) -> Result<Self> {
        let fused = fusion.fuse_store(&store)?;
        let index = SimilarityIndex::build(&fused, config);
        info!(
            "Built {} index over {} items (dim {})",
            config.kind,
            fused.len(),
            fused.dim()
        );
        Self::new(store, titles, fusion, Box::new(index))
    }

    #[inline]
    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    #[inline]
    pub fn titles(&self) -> &TitleRegistry {
        &self.titles
    }

    #[inline]
    pub fn fusion(&self) -> &FeatureFusion {
        &self.fusion
    }

    #[inline]
    pub fn index(&self) -> &dyn AnnIndex {
        self.index.as_ref()
    }

    /// Fused vector of a catalog item
    pub fn query_vector(&self, id: usize) -> Result<Vector> {
        Ok(self.fusion.fuse_row(self.store.row(id)?))
    }

    /// The `k` nearest items to `raw_title`, excluding the item itself.
    ///
    /// `Ok(None)` when the title is unknown.
    pub fn recommend(&self, raw_title: &str, k: usize) -> Result<Option<Vec<Recommendation>>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        let Some(id) = self.titles.resolve(raw_title) else {
            debug!("title {:?} not found", raw_title);
            return Ok(None);
        };

        let query = self.query_vector(id)?;
        let hits = self.neighbors_excluding(id, query.as_slice(), k)?;

        let recommendations = hits
            .into_iter()
            .map(|hit| {
                Ok(Recommendation {
                    title: self.titles.display_title(hit.id)?.to_string(),
                    distance: hit.distance,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "recommend {:?} (id {}): {} results",
            raw_title,
            id,
            recommendations.len()
        );
        Ok(Some(recommendations))
    }

    /// Query `k + 1` neighbors and drop the queried item by id, wherever the
    /// index ranked it.
    pub(crate) fn neighbors_excluding(&self, id: usize, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let hits = self.index.query(query, k + 1)?;
        let total = self.store.total_items();
        if let Some(bad) = hits.iter().find(|hit| hit.id >= total) {
            return Err(Error::InvariantViolation(format!(
                "index returned item {} outside a catalog of {} items",
                bad.id, total
            )));
        }
        Ok(exclude_self(hits, id, k))
    }

    /// Substring search over titles, in mapping order
    pub fn search(&self, query: &str, limit: usize) -> Vec<String> {
        self.titles.search(query, limit)
    }

    pub fn contains(&self, raw_title: &str) -> bool {
        self.titles.contains(raw_title)
    }

    #[inline]
    pub fn total_items(&self) -> usize {
        self.store.total_items()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            total_items: self.store.total_items(),
            total_titles: self.titles.len(),
            dimension: self.index.dim(),
            weights: self.fusion.weights(),
            index_kind: self.index.kind(),
            index_size: self.index.len(),
        }
    }
}

pub(crate) fn exclude_self(hits: Vec<Neighbor>, id: usize, k: usize) -> Vec<Neighbor> {
    hits.into_iter().filter(|hit| hit.id != id).take(k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMatrix;

    /// Index that ranks the queried item last, like an approximate index might
    struct SelfLastIndex {
        len: usize,
        dim: usize,
        self_id: usize,
    }

    impl AnnIndex for SelfLastIndex {
        fn kind(&self) -> IndexKind {
            IndexKind::Hnsw
        }

        fn len(&self) -> usize {
            self.len
        }

        fn dim(&self) -> usize {
            self.dim
        }

        fn query(&self, _vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
            let mut ids: Vec<usize> = (0..self.len).filter(|&i| i != self.self_id).collect();
            ids.truncate(k.saturating_sub(1));
            ids.push(self.self_id);
            Ok(ids
                .into_iter()
                .enumerate()
                .map(|(rank, id)| Neighbor {
                    id,
                    distance: rank as f32 * 0.1,
                })
                .collect())
        }
    }

    fn catalog() -> (FeatureStore, TitleRegistry) {
        let store = FeatureStore::new(
            FeatureMatrix::from_rows(vec![
                vec![1.0, 0.0],
                vec![0.9, 0.1],
                vec![0.5, 0.5],
                vec![0.1, 0.9],
                vec![0.0, 1.0],
            ])
            .unwrap(),
            FeatureMatrix::from_rows(vec![vec![1.0]; 5]).unwrap(),
            FeatureMatrix::from_rows(vec![vec![0.0]; 5]).unwrap(),
        )
        .unwrap();
        let titles = TitleRegistry::from_pairs([
            ("Alpha", 0usize),
            ("Beta", 1),
            ("Gamma", 2),
            ("Delta", 3),
            ("Epsilon", 4),
        ]);
        (store, titles)
    }

    #[test]
    fn test_recommend_excludes_self_by_id() {
        let (store, titles) = catalog();
        let index = SelfLastIndex {
            len: 5,
            dim: 4,
            self_id: 2,
        };
        let engine =
            RecommendationEngine::new(store, titles, FeatureFusion::default(), Box::new(index)).unwrap();

        let recs = engine.recommend("gamma", 3).unwrap().unwrap();
        let names: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Delta"]);
    }

    #[test]
    fn test_recommend_unknown_title() {
        let (store, titles) = catalog();
        let engine =
            RecommendationEngine::build(store, titles, FeatureFusion::default(), &IndexConfig::exact())
                .unwrap();
        assert!(engine.recommend("Nope", 2).unwrap().is_none());
        assert!(matches!(engine.recommend("Alpha", 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_mismatched_index_rejected() {
        let (store, titles) = catalog();
        let index = SelfLastIndex {
            len: 4,
            dim: 4,
            self_id: 0,
        };
        let err = RecommendationEngine::new(store, titles, FeatureFusion::default(), Box::new(index))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_title_id_out_of_range_rejected() {
        let (store, mut titles) = catalog();
        titles.insert("Zeta", 9);
        let err =
            RecommendationEngine::build(store, titles, FeatureFusion::default(), &IndexConfig::exact())
                .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_exclude_self_without_self_hit() {
        let hits = vec![
            Neighbor { id: 3, distance: 0.1 },
            Neighbor { id: 4, distance: 0.2 },
            Neighbor { id: 5, distance: 0.3 },
        ];
        let kept = exclude_self(hits, 0, 2);
        assert_eq!(kept.iter().map(|h| h.id).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_stats() {
        let (store, titles) = catalog();
        let engine =
            RecommendationEngine::build(store, titles, FeatureFusion::default(), &IndexConfig::exact())
                .unwrap();
        let stats = engine.stats();
        assert_eq!(stats.total_items, 5);
        assert_eq!(stats.total_titles, 5);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.index_kind, IndexKind::Exact);
    }
}
