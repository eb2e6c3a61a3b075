use std::path::Path;

use glam::DVec3;

use super::*;
use crate::index::TreeIndex;
use crate::tile_file::build_pyramid;
use crate::tree::ViewerLod;

const SIZE: [u32; 2] = [3, 3];

/// Plane DEM two levels deep; every leaf holds its patch-relative path.
fn write_dem(dir: &Path) {
  let mut dataset =
    TileDataset::<Height>::open(dir, Polyhedron::Plane, TileFileOptions::new(SIZE, true)).unwrap();
  let file = dataset.file_mut(0).unwrap();
  build_pyramid(file, TreeIndex::root(0), None, 2, |index, payload| {
    payload.fill(index.path() as f32);
  })
  .unwrap();
}

fn config(dem: &Path) -> TerrainConfig {
  let mut config = TerrainConfig::default();
  config.data.dem = dem.to_path_buf();
  config.data.tile_size = SIZE;
  config.fetch.budget_us = 10_000_000;
  config.tree = TreeConfig::UNLIMITED;
  config
}

struct Everywhere;

impl LodEvaluator<QuadScope> for Everywhere {
  fn visible(&self, _scope: &QuadScope, _level: u8) -> bool {
    true
  }

  fn lod(&self, _scope: &QuadScope, _level: u8) -> f64 {
    1.0
  }
}

#[test]
fn test_refines_to_deepest_stored_level() {
  let dir = tempfile::tempdir().unwrap();
  write_dem(dir.path());
  let mut session = TerrainSession::open(&config(dir.path())).unwrap();
  assert_eq!(session.frame(), 0);

  for _ in 0..6 {
    session.update(&Everywhere);
  }
  assert_eq!(session.frame(), 6);
  assert_eq!(session.tree().node_count(), 21);

  let leaves: Vec<_> = session.leaves().collect();
  assert_eq!(leaves.len(), 16);
  for leaf in &leaves {
    assert_eq!(leaf.index.level(), 2);
    let id = leaf.data[0].unwrap();
    let tile = session.data().dem().data(id);
    assert!(tile.payload.iter().all(|&v| v == leaf.index.path() as f32));
    assert!(!tile.has_children());
  }
  session.tree().check_invariants().unwrap();
}

#[test]
fn test_background_workers_reach_same_shape() {
  let dir = tempfile::tempdir().unwrap();
  write_dem(dir.path());
  let mut config = config(dir.path());
  config.fetch.worker_threads = 2;
  let mut session = TerrainSession::open(&config).unwrap();

  for _ in 0..8 {
    session.update(&Everywhere);
    session.finish();
  }
  assert_eq!(session.tree().node_count(), 21);
  assert_eq!(session.data().in_flight(), 0);
}

#[test]
fn test_missing_dataset_fails_to_open() {
  let dir = tempfile::tempdir().unwrap();
  let err = TerrainSession::open(&config(&dir.path().join("absent"))).err().unwrap();
  assert!(matches!(err, crate::TerrainError::Io(_)));
}

#[test]
fn test_distant_viewer_keeps_roots() {
  let dir = tempfile::tempdir().unwrap();
  write_dem(dir.path());
  let mut session = TerrainSession::open(&config(dir.path())).unwrap();

  let far = ViewerLod::new(DVec3::new(0.0, 1.0e6, 0.0), 1.0);
  for _ in 0..4 {
    let report = session.update(&far);
    assert_eq!(report.traversal.splits, 0);
  }
  assert_eq!(session.tree().node_count(), 1);
  // The root still loaded its own data.
  let root = session.tree().roots()[0];
  assert!(session.tree().node(root).unwrap().has_all_data());
}
