// Integration tests for cinesim
use cinesim_core::{
    AnnIndex, FeatureFusion, FeatureMatrix, FeatureStore, FusionWeights, HnswParams,
    IndexConfig, IndexKind, RecallEvaluator, RecommendationEngine, SimilarityIndex,
    TitleRegistry,
};
use cinesim_storage::{
    blob::{load_index, save_index},
    mapping::write_title_mapping,
    npy::write_npy,
    CatalogLoader, DataPaths, IndexBuilder,
};
use std::fs;

fn five_movie_store() -> FeatureStore {
    let embeddings = FeatureMatrix::from_rows(vec![
        vec![1.0, 0.0, 0.0],
        vec![0.9, 0.1, 0.0],
        vec![0.7, 0.3, 0.0],
        vec![0.0, 1.0, 0.0],
        vec![0.0, 0.0, 1.0],
    ])
    .unwrap();
    let categorical = FeatureMatrix::from_rows(vec![
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![0.0, 1.0],
    ])
    .unwrap();
    let numeric = FeatureMatrix::from_rows(vec![
        vec![0.5],
        vec![0.4],
        vec![0.2],
        vec![-0.3],
        vec![-0.8],
    ])
    .unwrap();
    FeatureStore::new(embeddings, categorical, numeric).unwrap()
}

fn five_movie_titles() -> TitleRegistry {
    TitleRegistry::from_pairs([
        ("The Matrix", 0usize),
        ("The Matrix Reloaded", 1),
        ("Cartoon Heroes", 2),
        ("Cartel Land", 3),
        ("Amélie", 4),
    ])
}

fn engine(config: &IndexConfig) -> RecommendationEngine {
    RecommendationEngine::build(
        five_movie_store(),
        five_movie_titles(),
        FeatureFusion::default(),
        config,
    )
    .unwrap()
}

#[test]
fn test_recommend_excludes_query_and_orders_by_distance() {
    let engine = engine(&IndexConfig::exact());

    let recs = engine.recommend("The Matrix", 2).unwrap().unwrap();
    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|r| r.title != "The Matrix"));
    assert!(recs[0].distance <= recs[1].distance);
    assert_eq!(recs[0].title, "The Matrix Reloaded");
    assert!(recs.iter().all(|r| r.distance >= 0.0));
}

#[test]
fn test_title_normalization() {
    let engine = engine(&IndexConfig::exact());

    let a = engine.recommend("The Matrix", 3).unwrap().unwrap();
    let b = engine.recommend("the matrix ", 3).unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(engine.titles().resolve("  THE MATRIX"), Some(0));
}

#[test]
fn test_unknown_title() {
    let engine = engine(&IndexConfig::exact());
    assert!(engine.recommend("Not A Real Movie", 5).unwrap().is_none());
    assert!(!engine.contains("Not A Real Movie"));
}

#[test]
fn test_k_larger_than_catalog() {
    let engine = engine(&IndexConfig::exact());
    let recs = engine.recommend("Amélie", 50).unwrap().unwrap();
    assert_eq!(recs.len(), 4);
    assert!(engine.recommend("Amélie", 0).is_err());
}

#[test]
fn test_search() {
    let engine = engine(&IndexConfig::exact());

    let hits = engine.search("cart", 5);
    assert!(hits.len() <= 5);
    assert_eq!(hits, vec!["Cartoon Heroes", "Cartel Land"]);
    assert!(hits.iter().all(|t| t.to_lowercase().contains("cart")));

    assert_eq!(engine.search("MATRIX", 1), vec!["The Matrix"]);
    assert!(engine.search("zzz", 10).is_empty());
}

#[test]
fn test_fused_vectors_are_unit_length() {
    let store = five_movie_store();
    let fused = FeatureFusion::default().fuse_store(&store).unwrap();
    assert_eq!(fused.len(), 5);
    assert_eq!(fused.dim(), 6);
    for row in fused.iter_rows() {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_recall_with_exact_index_is_one() {
    let engine = engine(&IndexConfig::exact());
    let evaluator = RecallEvaluator::new(&engine).unwrap();

    let summary = evaluator
        .evaluate(&["The Matrix", "Cartel Land", "Unknown"], 3)
        .unwrap();
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.missing, vec!["Unknown".to_string()]);
    assert_eq!(summary.mean_recall, Some(1.0));
}

#[test]
fn test_hnsw_matches_exact_on_small_catalog() {
    let exact = engine(&IndexConfig::exact());
    let hnsw = engine(&IndexConfig::hnsw(HnswParams::default()));
    assert_eq!(hnsw.stats().index_kind, IndexKind::Hnsw);

    for title in ["The Matrix", "Cartel Land", "Amélie"] {
        let a: Vec<String> = exact
            .recommend(title, 3)
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        let b: Vec<String> = hnsw
            .recommend(title, 3)
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(a, b);
    }
}

#[test]
fn test_index_blob_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index").join("cinesim_index.bin");

    let fused = FeatureFusion::default()
        .fuse_store(&five_movie_store())
        .unwrap();
    let index = SimilarityIndex::build(&fused, &IndexConfig::hnsw(HnswParams::default()));
    let weights = FusionWeights::default();
    save_index(&path, &index, weights).unwrap();

    let (header, loaded) = load_index(&path).unwrap();
    assert_eq!(header.kind, IndexKind::Hnsw);
    assert_eq!(header.weights, weights);
    assert_eq!(loaded.len(), 5);

    let query = fused.row(2).unwrap();
    assert_eq!(index.query(query, 5).unwrap(), loaded.query(query, 5).unwrap());
}

#[test]
fn test_build_then_load_from_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::from_data_dir(dir.path());
    let store = five_movie_store();

    fs::create_dir_all(paths.embeddings.parent().unwrap()).unwrap();
    fs::create_dir_all(paths.titles.parent().unwrap()).unwrap();
    write_npy(&paths.embeddings, store.embedding()).unwrap();
    write_npy(&paths.numeric, store.numeric()).unwrap();
    fs::write(
        &paths.categorical,
        "genre_Action,genre_Drama\nTrue,False\n1,0\n1.0,0.0\nFalse,True\n0,1\n",
    )
    .unwrap();
    write_title_mapping(
        &paths.titles,
        &[
            ("The Matrix", 0usize),
            ("The Matrix Reloaded", 1),
            ("Cartoon Heroes", 2),
            ("Cartel Land", 3),
            ("Amélie", 4),
        ],
    )
    .unwrap();

    let weights = FusionWeights::default();
    let report = IndexBuilder::new(paths.clone(), weights, IndexConfig::exact())
        .build()
        .unwrap();
    assert_eq!(report.items, 5);
    assert_eq!(report.dimension, 6);
    assert!(report.path.exists());

    let engine = CatalogLoader::new(paths.clone(), weights).load().unwrap();
    let expected = self::engine(&IndexConfig::exact());
    assert_eq!(
        engine.recommend("the matrix", 4).unwrap(),
        expected.recommend("the matrix", 4).unwrap()
    );

    // Serving with different weights than the index was built with is refused
    let other = FusionWeights::new(0.6, 0.2, 0.2).unwrap();
    assert!(CatalogLoader::new(paths, other).load().is_err());
}
