use super::*;
use crate::cache::{CacheUnit, EvictionPolicy};
use crate::tree::{Polyhedron, QuadScope};

// =============================================================================
// Fixtures
// =============================================================================

/// Single-channel data backed by a real cache of empty buffers.
struct MockData {
  cache: CacheUnit<TreeIndex, ()>,
  requests: Vec<Request<QuadScope>>,
  refine: bool,
}

impl MockData {
  fn new() -> Self {
    Self {
      cache: CacheUnit::new(256, EvictionPolicy::ProtectCurrent, || ()),
      requests: Vec::new(),
      refine: true,
    }
  }

  fn load(&mut self, index: TreeIndex, frame: Frame) {
    let id = self.cache.grab(frame, None).unwrap();
    self.cache.release(index, id);
    self.cache.touch(id, frame);
  }

  fn load_children(&mut self, index: TreeIndex, frame: Frame) {
    for child in index.children().unwrap() {
      self.load(child, frame);
    }
  }
}

impl NodeData<QuadScope> for MockData {
  fn channel_count(&self) -> usize {
    1
  }

  fn refresh(&mut self, _channel: usize, index: TreeIndex, _held: Option<BufferId>, frame: Frame) -> Option<BufferId> {
    let id = self.lookup(0, index)?;
    self.cache.touch(id, frame);
    Some(id)
  }

  fn lookup(&self, _channel: usize, index: TreeIndex) -> Option<BufferId> {
    self.cache.find(&index).filter(|&id| self.cache.is_valid(id))
  }

  fn child_hint(&self, _channel: usize, _parent: Option<BufferId>, _which: u8) -> TileHint {
    TileHint::Unknown
  }

  fn can_refine(&self, _index: TreeIndex, primary: Option<BufferId>) -> bool {
    self.refine && primary.is_some()
  }

  fn request(&mut self, request: Request<QuadScope>) {
    self.requests.push(request);
  }
}

/// Same LOD and visibility everywhere.
struct FixedLod {
  lod: f64,
  visible: bool,
}

impl LodEvaluator<QuadScope> for FixedLod {
  fn visible(&self, _scope: &QuadScope, _level: u8) -> bool {
    self.visible
  }

  fn lod(&self, _scope: &QuadScope, _level: u8) -> f64 {
    self.lod
  }
}

fn refine() -> FixedLod {
  FixedLod {
    lod: 1.0,
    visible: true,
  }
}

fn plane_tree(config: TreeConfig) -> QuadTerrain<QuadScope> {
  QuadTerrain::new(Polyhedron::Plane.root_scopes(1.0), 1, config)
}

// =============================================================================
// Split / merge
// =============================================================================

#[test]
fn test_split_creates_four_children() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let root = tree.roots()[0];
  let root_index = tree.node(root).unwrap().index;

  let first = tree.force_split(root).unwrap();
  assert_eq!(tree.node_count(), 5);
  assert_eq!(tree.node(root).unwrap().children, Some(first));
  for which in 0..4u8 {
    let child = tree.node(first.offset(which)).unwrap();
    assert_eq!(child.index.level(), 1);
    assert_eq!(child.index.child(), which);
    assert_eq!(child.index.up().unwrap(), root_index);
    assert_eq!(child.parent, Some(root));
    assert!(child.is_leaf());
  }
  tree.check_invariants().unwrap();
}

#[test]
fn test_merge_restores_single_leaf_and_reuses_block() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let root = tree.roots()[0];
  let first = tree.force_split(root).unwrap();
  let capacity = tree.pool().capacity();

  assert!(tree.force_merge(root));
  assert_eq!(tree.node_count(), 1);
  assert!(tree.node(root).unwrap().is_leaf());
  assert_eq!(tree.pool().free_blocks(), 1);
  assert!(!tree.force_merge(root));

  assert_eq!(tree.force_split(root), Some(first));
  assert_eq!(tree.pool().capacity(), capacity);
  assert_eq!(tree.pool().free_blocks(), 0);
  tree.check_invariants().unwrap();
}

#[test]
fn test_merge_releases_grandchildren() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let root = tree.roots()[0];
  let first = tree.force_split(root).unwrap();
  tree.force_split(first.offset(2)).unwrap();
  assert_eq!(tree.node_count(), 9);

  tree.force_merge(root);
  assert_eq!(tree.node_count(), 1);
  assert_eq!(tree.pool().free_blocks(), 2);
  tree.check_invariants().unwrap();
}

#[test]
fn test_force_split_rejects_split_node() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let root = tree.roots()[0];
  tree.force_split(root).unwrap();
  assert_eq!(tree.force_split(root), None);
  assert_eq!(tree.node_count(), 5);
}

// =============================================================================
// Traversal
// =============================================================================

#[test]
fn test_root_without_data_requests_itself() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let stats = tree.traverse(1, &refine(), &mut data);

  assert_eq!(stats.requests, 1);
  assert_eq!(data.requests[0].index, TreeIndex::root(0));
  assert_eq!(data.requests[0].priority, ROOT_REQUEST_PRIORITY);
  // Primary data is missing, so the root cannot refine yet.
  assert_eq!(stats.splits, 0);
}

#[test]
fn test_split_waits_for_child_data() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let root_index = TreeIndex::root(0);
  data.load(root_index, 0);

  let stats = tree.traverse(1, &refine(), &mut data);
  assert_eq!(stats.splits, 0);
  assert_eq!(stats.deferred_splits, 1);
  assert_eq!(stats.requests, 4);
  assert_eq!(tree.node_count(), 1);
  let mut requested: Vec<_> = data.requests.iter().map(|r| r.index).collect();
  requested.sort();
  let mut expected = root_index.children().unwrap().to_vec();
  expected.sort();
  assert_eq!(requested, expected);
  assert!(data.requests.iter().all(|r| r.priority == 1.0));

  data.requests.clear();
  data.load_children(root_index, 1);
  let stats = tree.traverse(2, &refine(), &mut data);
  assert_eq!(stats.splits, 1);
  assert_eq!(tree.node_count(), 5);
  // Each new leaf now asks for its own children.
  assert_eq!(stats.deferred_splits, 4);
  assert_eq!(data.requests.len(), 16);
  tree.check_invariants().unwrap();
}

#[test]
fn test_traversal_touches_active_buffers() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let root_index = TreeIndex::root(0);
  data.load(root_index, 0);
  data.load_children(root_index, 0);

  tree.traverse(5, &refine(), &mut data);
  let root = tree.node(tree.roots()[0]).unwrap();
  let id = root.data[0].unwrap();
  assert_eq!(data.cache.frame_stamp(id), Some(5));
  for child in root_index.children().unwrap() {
    let id = data.cache.find(&child).unwrap();
    assert_eq!(data.cache.frame_stamp(id), Some(5));
  }
}

#[test]
fn test_coarse_lod_merges() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let root = tree.roots()[0];
  data.load(TreeIndex::root(0), 0);
  tree.force_split(root);

  let coarse = FixedLod {
    lod: -1.0,
    visible: true,
  };
  let stats = tree.traverse(1, &coarse, &mut data);
  assert_eq!(stats.merges, 1);
  assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_hysteresis_band_keeps_shape() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let root = tree.roots()[0];
  data.load(TreeIndex::root(0), 0);
  data.load_children(TreeIndex::root(0), 0);
  tree.force_split(root);

  let between = FixedLod {
    lod: -0.2,
    visible: true,
  };
  let stats = tree.traverse(1, &between, &mut data);
  assert_eq!(stats.merges, 0);
  assert_eq!(stats.splits, 0);
  assert_eq!(tree.node_count(), 5);
}

#[test]
fn test_invisible_subtree_is_merged() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let root = tree.roots()[0];
  let first = tree.force_split(root).unwrap();
  tree.force_split(first).unwrap();

  let hidden = FixedLod {
    lod: 5.0,
    visible: false,
  };
  tree.traverse(1, &hidden, &mut data);
  assert_eq!(tree.node_count(), 1);
  assert_eq!(tree.leaves().count(), 0);
  tree.check_invariants().unwrap();
}

#[test]
fn test_no_split_without_deeper_data() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  data.refine = false;
  data.load(TreeIndex::root(0), 0);

  let stats = tree.traverse(1, &refine(), &mut data);
  assert_eq!(stats.requests, 0);
  assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_max_level_stops_refinement() {
  let config = TreeConfig {
    max_level: 0,
    ..TreeConfig::UNLIMITED
  };
  let mut tree = plane_tree(config);
  let mut data = MockData::new();
  data.load(TreeIndex::root(0), 0);
  data.load_children(TreeIndex::root(0), 0);

  let stats = tree.traverse(1, &refine(), &mut data);
  assert_eq!(stats.splits, 0);
  assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_split_budget_per_frame() {
  let config = TreeConfig {
    max_splits_per_frame: 1,
    ..TreeConfig::UNLIMITED
  };
  let mut tree = QuadTerrain::new(Polyhedron::Cube.root_scopes(1.0), 1, config);
  let mut data = MockData::new();
  for patch in 0..6 {
    data.load(TreeIndex::root(patch), 0);
    data.load_children(TreeIndex::root(patch), 0);
  }

  let stats = tree.traverse(1, &refine(), &mut data);
  assert_eq!(stats.splits, 1);
  assert_eq!(tree.node_count(), 10);

  let stats = tree.traverse(2, &refine(), &mut data);
  assert_eq!(stats.splits, 1);
  assert_eq!(tree.node_count(), 14);
  tree.check_invariants().unwrap();
}

#[test]
fn test_leaves_yield_visible_leaves() {
  let mut tree = plane_tree(TreeConfig::UNLIMITED);
  let mut data = MockData::new();
  let root = tree.roots()[0];
  tree.force_split(root);

  let steady = FixedLod {
    lod: 0.0,
    visible: true,
  };
  tree.traverse(1, &steady, &mut data);
  let leaves: Vec<_> = tree.leaves().collect();
  assert_eq!(leaves.len(), 4);
  for (which, leaf) in leaves.iter().enumerate() {
    assert_eq!(leaf.index.level(), 1);
    assert_eq!(leaf.index.child(), which as u8);
    assert_eq!(leaf.data.len(), 1);
  }
  assert_eq!(tree.all_leaves().count(), 4);
}
