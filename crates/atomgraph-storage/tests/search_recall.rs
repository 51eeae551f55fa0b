//! Hybrid search quality against brute force.
//!
//! Three data shapes: vectors near the landmark subspace, tight clusters
//! around random centroids, and isotropic noise. The first two have low
//! intrinsic dimension and a 3-D projection keeps their neighbourhoods.
//! Isotropic data has none, so there recall only has to beat the share of
//! the corpus that was reranked.

mod common;

use std::sync::Arc;

use atomgraph_core::config::SearchConfig;
use atomgraph_core::distance::DistanceMetric;
use atomgraph_storage::search::quality::{recall_at_k, spearman_rank_correlation};
use atomgraph_storage::{
    AtomMetadata, AtomStore, CoreError, EmbeddingStore, HybridSearchEngine, PipelineStage,
    RocksDbAtomStore, SearchFilters,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

use common::{
    create_test_store, jitter, landmark_basis, near_subspace_vector, random_unit_vector, text, DIM,
};

const CORPUS: usize = 1000;
const QUERIES: usize = 25;
const NOISE: f32 = 0.02;

fn populate(store: &RocksDbAtomStore, rng: &mut ChaCha8Rng, n: usize) -> Vec<Vec<f32>> {
    let basis = landmark_basis(&store.active_landmarks());
    let mut vectors = Vec::with_capacity(n);
    for i in 0..n {
        let modality = if i % 4 == 0 { "image" } else { "text" };
        let r = store.put(&text(i), modality, None, AtomMetadata::default()).unwrap();
        let v = near_subspace_vector(rng, &basis, NOISE);
        store.attach(r.atom_id, &v, "content", "mini-32").unwrap();
        vectors.push(v);
    }
    vectors
}

#[test]
fn test_recall_at_10_meets_target() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    populate(&store, &mut rng, CORPUS);

    let engine = store.search_engine(SearchConfig::default());
    let basis = landmark_basis(&store.active_landmarks());

    let mut total = 0.0f32;
    let mut fallbacks = 0;
    for _ in 0..QUERIES {
        let q = near_subspace_vector(&mut rng, &basis, NOISE);
        let approx = engine.search(&q, 10, &SearchFilters::none()).unwrap();
        let exact = engine.search_exact(&q, 10, &SearchFilters::none()).unwrap();
        let exact_ids: Vec<_> = exact.iter().map(|h| h.atom_id).collect();

        assert_eq!(approx.len(), 10);
        if approx.used_fallback {
            fallbacks += 1;
        }
        total += recall_at_k(&approx.atom_ids(), &exact_ids, 10);
    }
    let recall = total / QUERIES as f32;
    println!("=== TEST mean recall@10={:.3} fallbacks={}", recall, fallbacks);
    assert!(recall >= 0.85, "recall@10 {} below 0.85", recall);
}

fn put_all(store: &RocksDbAtomStore, vectors: &[Vec<f32>]) {
    for (i, v) in vectors.iter().enumerate() {
        let r = store.put(&text(i), "text", None, AtomMetadata::default()).unwrap();
        store.attach(r.atom_id, v, "content", "mini-32").unwrap();
    }
}

/// Mean recall@10 of `engine` against brute force over `queries`.
fn mean_recall(
    engine: &HybridSearchEngine,
    queries: &[Vec<f32>],
) -> (f32, usize) {
    let mut total = 0.0f32;
    let mut reranked = 0;
    for q in queries {
        let approx = engine.search(q, 10, &SearchFilters::none()).unwrap();
        let exact = engine.search_exact(q, 10, &SearchFilters::none()).unwrap();
        let exact_ids: Vec<_> = exact.iter().map(|h| h.atom_id).collect();
        assert_eq!(approx.len(), 10);
        reranked = reranked.max(approx.stage(PipelineStage::ExactRerank).unwrap().candidates_in);
        total += recall_at_k(&approx.atom_ids(), &exact_ids, 10);
    }
    (total / queries.len() as f32, reranked)
}

#[test]
fn test_recall_on_random_clusters() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let mut rng = ChaCha8Rng::seed_from_u64(31);

    // 20 clusters of 50 around centroids unrelated to the landmarks
    let centroids: Vec<Vec<f32>> = (0..20).map(|_| random_unit_vector(&mut rng, DIM)).collect();
    let mut vectors = Vec::with_capacity(CORPUS);
    for c in &centroids {
        for _ in 0..CORPUS / centroids.len() {
            vectors.push(jitter(&mut rng, c, 0.03));
        }
    }
    put_all(&store, &vectors);

    let queries: Vec<Vec<f32>> = (0..QUERIES)
        .map(|i| jitter(&mut rng, &centroids[(i * 7) % centroids.len()], 0.03))
        .collect();
    let engine = store.search_engine(SearchConfig::default());
    let (recall, reranked) = mean_recall(&engine, &queries);
    println!("=== TEST clustered recall@10={:.3} reranked<={}", recall, reranked);
    assert!(recall >= 0.85, "recall@10 {} below 0.85", recall);
    assert!(reranked < CORPUS / 2);
}

#[test]
fn test_isotropic_data_beats_reranked_share() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let mut rng = ChaCha8Rng::seed_from_u64(37);
    let vectors: Vec<Vec<f32>> = (0..CORPUS).map(|_| random_unit_vector(&mut rng, DIM)).collect();
    put_all(&store, &vectors);
    let queries: Vec<Vec<f32>> = (0..QUERIES).map(|_| random_unit_vector(&mut rng, DIM)).collect();

    let engine = store.search_engine(SearchConfig::default());
    let (recall, reranked) = mean_recall(&engine, &queries);
    let share = reranked as f32 / CORPUS as f32;
    println!(
        "=== TEST isotropic recall@10={:.3} reranked share={:.3}",
        recall, share
    );
    // A random pick of `reranked` atoms would find `share` of the top 10
    assert!(recall >= 1.5 * share, "recall {} vs share {}", recall, share);

    // Reranking the whole corpus is exact again
    let full = store.search_engine(SearchConfig {
        min_candidate_fraction: 1.0,
        ..SearchConfig::default()
    });
    for q in queries.iter().take(5) {
        let approx = full.search(q, 10, &SearchFilters::none()).unwrap();
        let exact = full.search_exact(q, 10, &SearchFilters::none()).unwrap();
        assert_eq!(approx.hits, exact);
    }
}

#[test]
fn test_spatial_path_prunes_candidates() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    populate(&store, &mut rng, CORPUS);

    let engine = store.search_engine(SearchConfig::default());
    let basis = landmark_basis(&store.active_landmarks());
    let q = near_subspace_vector(&mut rng, &basis, NOISE);
    let outcome = engine.search(&q, 10, &SearchFilters::none()).unwrap();

    let rerank = outcome.stage(PipelineStage::ExactRerank).unwrap();
    println!("=== TEST stages: {:?}", outcome.stages);
    assert!(!outcome.used_fallback);
    assert!(rerank.candidates_in <= 100, "rerank saw {}", rerank.candidates_in);
    assert!(rerank.candidates_in < CORPUS);
}

#[test]
fn test_projection_preserves_distance_order() {
    let tmp = TempDir::new().unwrap();
    let store = create_test_store(&tmp);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    populate(&store, &mut rng, 60);

    let mut embeddings = Vec::new();
    for i in 1..=60u64 {
        let records = store.embeddings_for_atom(atomgraph_storage::AtomId(i)).unwrap();
        let e = store.get_embedding(records[0].embedding_id).unwrap();
        embeddings.push(e);
    }

    let mut true_dist = Vec::new();
    let mut projected = Vec::new();
    for i in 0..embeddings.len() {
        for j in (i + 1)..embeddings.len() {
            true_dist.push(
                DistanceMetric::Cosine.distance(&embeddings[i].vector, &embeddings[j].vector),
            );
            projected.push(
                embeddings[i]
                    .record
                    .coord_fine
                    .distance(&embeddings[j].record.coord_fine),
            );
        }
    }
    let rho = spearman_rank_correlation(&true_dist, &projected).unwrap();
    println!("=== TEST spearman rho over {} pairs = {:.3}", true_dist.len(), rho);
    assert!(rho >= 0.85, "rank correlation {} below 0.85", rho);
}

#[test]
fn test_filters_and_fallback_through_store() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    populate(&store, &mut rng, 40);

    let basis = landmark_basis(&store.active_landmarks());
    let q = near_subspace_vector(&mut rng, &basis, NOISE);

    let engine = store.search_engine(SearchConfig::default());
    let images = SearchFilters::none().with_modality("image");
    let outcome = engine.search(&q, 5, &images).unwrap();
    assert_eq!(outcome.len(), 5);
    for hit in &outcome.hits {
        assert_eq!(store.get(hit.atom_id).unwrap().modality, "image");
    }

    // A radius that never widens must fall back to scanning
    let strict = store.search_engine(SearchConfig {
        initial_radius: 1e-6,
        max_widenings: 0,
        ..SearchConfig::default()
    });
    let outcome = strict.search(&q, 5, &SearchFilters::none()).unwrap();
    assert!(outcome.used_fallback);
    assert_eq!(outcome.len(), 5);
    let exact = strict.search_exact(&q, 5, &SearchFilters::none()).unwrap();
    assert_eq!(outcome.hits, exact);

    let none = SearchFilters::none().with_model_id("unknown-model");
    assert!(engine.search(&q, 5, &none).unwrap().is_empty());
}

#[test]
fn edge_case_query_dimension_mismatch() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(create_test_store(&tmp));
    let engine = store.search_engine(SearchConfig::default());
    let err = engine.search(&vec![0.1; DIM + 1], 10, &SearchFilters::none()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::DimensionMismatch {
            expected: DIM,
            actual
        } if actual == DIM + 1
    ));
}
