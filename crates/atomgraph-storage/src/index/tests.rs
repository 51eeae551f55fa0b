use std::sync::Arc;

use atomgraph_core::distance::DistanceMetric;
use atomgraph_core::projection::{LandmarkProjector, LandmarkSet};
use atomgraph_core::types::{AtomId, EmbeddingId, SpatialCoord};

use super::*;

fn projector(version: u32) -> Arc<LandmarkProjector> {
    let set = LandmarkSet::canonical(version, 4, DistanceMetric::Euclidean).unwrap();
    Arc::new(LandmarkProjector::new(Arc::new(set)).unwrap())
}

fn entry(id: u64, x: f32, y: f32, z: f32) -> IndexEntry {
    IndexEntry {
        embedding_id: EmbeddingId(id),
        atom_id: AtomId(id),
        coarse: SpatialCoord::new(x, y, z),
        fine: SpatialCoord::new(x, y, z),
        embedding_type: "content".into(),
        model_id: "m1".into(),
        modality: "text".into(),
    }
}

fn ids(candidates: &[SpatialCandidate]) -> Vec<u64> {
    let mut out: Vec<u64> = candidates.iter().map(|c| c.embedding_id.0).collect();
    out.sort_unstable();
    out
}

#[test]
fn test_radius_query_returns_only_points_inside() {
    let index = SpatialIndex::new(projector(1), 0.125).unwrap();
    index.upsert(entry(1, 0.0, 0.0, 0.0));
    index.upsert(entry(2, 0.1, 0.0, 0.0));
    index.upsert(entry(3, 0.5, 0.5, 0.0));
    index.upsert(entry(4, -0.9, -0.9, -0.9));

    let view = index.view();
    let origin = SpatialCoord::ORIGIN;
    assert_eq!(ids(&view.within_radius(&origin, 0.05, &SearchFilters::none())), vec![1]);
    assert_eq!(ids(&view.within_radius(&origin, 0.2, &SearchFilters::none())), vec![1, 2]);
    assert_eq!(
        ids(&view.within_radius(&origin, 0.75, &SearchFilters::none())),
        vec![1, 2, 3]
    );
    assert_eq!(
        ids(&view.within_radius(&origin, view.covering_radius(), &SearchFilters::none())),
        vec![1, 2, 3, 4]
    );
}

#[test]
fn test_upsert_moves_entry_between_cells() {
    let index = SpatialIndex::new(projector(1), 0.125).unwrap();
    index.upsert(entry(1, 0.9, 0.9, 0.9));
    index.upsert(entry(1, -0.9, -0.9, -0.9));
    assert_eq!(index.len(), 1);

    let view = index.view();
    let near_old = view.within_radius(&SpatialCoord::new(0.9, 0.9, 0.9), 0.1, &SearchFilters::none());
    let near_new =
        view.within_radius(&SpatialCoord::new(-0.9, -0.9, -0.9), 0.1, &SearchFilters::none());
    assert!(near_old.is_empty());
    assert_eq!(ids(&near_new), vec![1]);
}

#[test]
fn test_filters_apply_to_radius_and_scan() {
    let index = SpatialIndex::new(projector(1), 0.125).unwrap();
    index.upsert(entry(1, 0.0, 0.0, 0.0));
    let mut image = entry(2, 0.0, 0.0, 0.0);
    image.modality = "image".into();
    image.model_id = "clip".into();
    index.upsert(image);

    let view = index.view();
    let text_only = SearchFilters::none().with_modality("text");
    let clip_only = SearchFilters::none().with_model_id("clip");
    let nothing = SearchFilters::none().with_embedding_type("summary");

    assert_eq!(ids(&view.within_radius(&SpatialCoord::ORIGIN, 0.1, &text_only)), vec![1]);
    assert_eq!(ids(&view.filtered(&clip_only)), vec![2]);
    assert!(view.filtered(&nothing).is_empty());
    assert_eq!(ids(&view.filtered(&SearchFilters::none())), vec![1, 2]);
}

#[test]
fn test_remove_many_counts_existing() {
    let index = SpatialIndex::new(projector(1), 0.125).unwrap();
    for i in 1..=5 {
        index.upsert(entry(i, 0.1 * i as f32, 0.0, 0.0));
    }
    let removed = index.remove_many(&[EmbeddingId(2), EmbeddingId(4), EmbeddingId(99)]);
    assert_eq!(removed, 2);
    assert_eq!(index.len(), 3);
    assert!(index.get(EmbeddingId(2)).is_none());
    assert!(index.remove(EmbeddingId(1)).is_some());
    assert!(index.remove(EmbeddingId(1)).is_none());
}

#[test]
fn test_replace_swaps_projector_and_entries() {
    let index = SpatialIndex::new(projector(1), 0.125).unwrap();
    index.upsert(entry(1, 0.0, 0.0, 0.0));
    index.replace(projector(2), vec![entry(7, 0.3, 0.3, 0.3), entry(8, -0.3, 0.0, 0.0)]);

    assert_eq!(index.projector().version(), 2);
    assert_eq!(index.len(), 2);
    assert!(index.get(EmbeddingId(1)).is_none());
    let view = index.view();
    assert_eq!(view.projector().version(), 2);
    assert_eq!(
        ids(&view.within_radius(&SpatialCoord::new(0.3, 0.3, 0.3), 0.01, &SearchFilters::none())),
        vec![7]
    );
}

#[test]
fn edge_case_invalid_cell_size() {
    assert!(SpatialIndex::new(projector(1), 0.0).is_err());
    assert!(SpatialIndex::new(projector(1), -1.0).is_err());
    assert!(SpatialIndex::new(projector(1), f32::NAN).is_err());
}

#[test]
fn edge_case_points_on_cube_boundary() {
    // Coordinates equal to +scale fall in the last cell, not past it
    let index = SpatialIndex::new(projector(1), 0.125).unwrap();
    index.upsert(entry(1, 1.0, 1.0, 1.0));
    index.upsert(entry(2, -1.0, -1.0, -1.0));

    let view = index.view();
    assert_eq!(
        ids(&view.within_radius(&SpatialCoord::new(1.0, 1.0, 1.0), 0.0, &SearchFilters::none())),
        vec![1]
    );
    assert_eq!(
        ids(&view.within_radius(&SpatialCoord::new(-1.0, -1.0, -1.0), 0.01, &SearchFilters::none())),
        vec![2]
    );
}

#[test]
fn edge_case_empty_index() {
    let index = SpatialIndex::new(projector(1), 0.5).unwrap();
    assert!(index.is_empty());
    let view = index.view();
    assert!(view.is_empty());
    assert!(view
        .within_radius(&SpatialCoord::ORIGIN, view.covering_radius(), &SearchFilters::none())
        .is_empty());
}
