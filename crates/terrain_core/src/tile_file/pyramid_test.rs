use super::*;
use crate::types::{Color, Height, ValueRange};

const W: u32 = 5;

#[test]
fn test_downsample_constant() {
  let child = vec![7.0f32; 25];
  let mut out = vec![0.0f32; 25];
  downsample::<Height>([&child[..], &child[..], &child[..], &child[..]], [W, W], -1.0, &mut out);
  assert!(out.iter().all(|&v| v == 7.0));
}

#[test]
fn test_downsample_quadrants_follow_selector() {
  let children: Vec<Vec<f32>> = (0..4).map(|c| vec![c as f32; 25]).collect();
  let mut out = vec![0.0f32; 25];
  downsample::<Height>(
    [&children[0][..], &children[1][..], &children[2][..], &children[3][..]],
    [W, W],
    -1.0,
    &mut out,
  );
  let at = |x: usize, y: usize| out[y * W as usize + x];
  assert_eq!(at(0, 0), 0.0);
  assert_eq!(at(4, 0), 1.0);
  assert_eq!(at(0, 4), 2.0);
  assert_eq!(at(4, 4), 3.0);
  // Shared center pixel comes from child 0's corner.
  assert_eq!(at(2, 2), 0.0);
}

#[test]
fn test_downsample_skips_nodata() {
  let nodata = -1.0f32;
  let mut child = vec![4.0f32; 25];
  child[1] = nodata;
  let mut out = vec![0.0f32; 25];
  downsample::<Height>([&child[..], &child[..], &child[..], &child[..]], [W, W], nodata, &mut out);
  assert_eq!(out[0], 4.0);
}

#[test]
fn test_downsample_color() {
  let child = vec![[10u8, 20, 30]; 9];
  let mut out = vec![[0u8; 3]; 9];
  downsample::<Color>([&child[..], &child[..], &child[..], &child[..]], [3, 3], [0, 0, 0], &mut out);
  assert!(out.iter().all(|&v| v == [10, 20, 30]));
}

#[test]
fn test_build_pyramid_layout() {
  let dir = tempfile::tempdir().unwrap();
  let mut file = TileFile::<Height>::open(dir.path().join("patch_00.qtf"), [W, W], true).unwrap();
  let root = TreeIndex::root(0);

  let mut leaves = 0;
  let tile = build_pyramid(&mut file, root, None, 2, |index, payload| {
    leaves += 1;
    payload.fill(index.path() as f32);
  })
  .unwrap();

  assert_eq!(tile, 0);
  assert_eq!(leaves, 16);
  assert_eq!(file.tile_count(), 21);

  // Every leaf is reachable and holds its callback payload.
  let leaf = root.down(3).unwrap().down(1).unwrap();
  let leaf_tile = file.check_tile(leaf, 0).unwrap();
  assert_ne!(leaf_tile, NO_TILE);
  let mut payload = vec![0.0f32; 25];
  let meta = file.read_tile(leaf_tile, Some(&mut payload)).unwrap().unwrap();
  assert!(!meta.has_children());
  assert!(payload.iter().all(|&v| v == leaf.path() as f32));
  assert_eq!(
    meta.header,
    ValueRange {
      min: leaf.path() as f32,
      max: leaf.path() as f32
    }
  );

  // The root header spans the leaves it was averaged from.
  let meta = file.read_tile(0, None).unwrap().unwrap();
  assert!(meta.has_children());
  assert!(meta.header.min >= 0.0);
  assert!(meta.header.max <= 15.0);
  assert!(meta.header.min < meta.header.max);
}

#[test]
fn test_build_into_existing_root() {
  let dir = tempfile::tempdir().unwrap();
  let mut file = TileFile::<Height>::open(dir.path().join("patch_00.qtf"), [W, W], true).unwrap();
  let existing = file.append_tile(true).unwrap();
  let tile = build_pyramid(&mut file, TreeIndex::root(0), Some(existing), 1, |_, p| p.fill(2.0)).unwrap();
  assert_eq!(tile, existing);
  assert_eq!(file.tile_count(), 5);

  let mut payload = vec![0.0f32; 25];
  file.read_tile(existing, Some(&mut payload)).unwrap();
  assert!(payload.iter().all(|&v| v == 2.0));
}

#[test]
fn test_build_into_missing_root_fails() {
  let dir = tempfile::tempdir().unwrap();
  let mut file = TileFile::<Height>::open(dir.path().join("patch_00.qtf"), [W, W], true).unwrap();
  let err = build_pyramid(&mut file, TreeIndex::root(0), Some(3), 1, |_, _| {}).unwrap_err();
  assert!(matches!(err, TerrainError::InvalidIndex(_)));
}
