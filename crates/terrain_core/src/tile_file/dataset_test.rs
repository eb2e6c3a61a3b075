use super::*;
use crate::types::{Color, Height};

const SIZE: [u32; 2] = [3, 3];

fn options<P: PixelKind>(writable: bool) -> TileFileOptions<P> {
  TileFileOptions::new(SIZE, writable)
}

#[test]
fn test_create_writes_layout_and_patches() {
  let dir = tempfile::tempdir().unwrap();
  let dataset = TileDataset::<Height>::open(dir.path(), Polyhedron::Cube, options(true)).unwrap();
  assert!(dir.path().join(LAYOUT_FILE_NAME).exists());
  for patch in 0..6u8 {
    assert!(dir.path().join(patch_file_name(patch)).exists());
    assert!(dataset.file(patch).is_some());
  }
  assert!(dataset.file(6).is_none());

  let layout = DatasetLayout::load(&dir.path().join(LAYOUT_FILE_NAME)).unwrap();
  assert_eq!(layout.data_type, "Height");
  assert_eq!(layout.num_channels, 1);
  assert_eq!(layout.polyhedron, "cube");
  assert_eq!(layout.tile_size, SIZE);
  assert_eq!(layout.nodata, vec![-32768.0]);
}

#[test]
fn test_layout_is_readable_toml() {
  let layout = DatasetLayout::new::<Color>(Polyhedron::Plane, [65, 65], [1, 2, 3]);
  let text = toml::to_string_pretty(&layout).unwrap();
  assert!(text.contains("data_type = \"Color\""));
  let back: DatasetLayout = toml::from_str(&text).unwrap();
  assert_eq!(back, layout);
}

#[test]
fn test_reopen_read_only() {
  let dir = tempfile::tempdir().unwrap();
  {
    let mut dataset =
      TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(true)).unwrap();
    assert_eq!(dataset.ensure_root(0).unwrap(), 0);
    assert_eq!(dataset.ensure_root(0).unwrap(), 0);
    dataset.flush().unwrap();
  }
  let mut dataset =
    TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(false)).unwrap();
  assert_eq!(dataset.locate(TreeIndex::root(0)).unwrap(), 0);
  assert_eq!(dataset.locate(TreeIndex::root(0).down(2).unwrap()).unwrap(), NO_TILE);
  let mut payload = vec![0.0f32; 9];
  assert!(dataset.read(0, 0, Some(&mut payload)).unwrap().is_some());
  assert!(payload.iter().all(|&v| v == dataset.nodata()));
}

#[test]
fn test_kind_mismatch() {
  let dir = tempfile::tempdir().unwrap();
  drop(TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(true)).unwrap());
  let err = TileDataset::<Color>::open(dir.path(), Polyhedron::Plane, options(false))
    .err()
    .unwrap();
  assert!(matches!(err, TerrainError::FormatMismatch { .. }));
}

#[test]
fn test_polyhedron_mismatch() {
  let dir = tempfile::tempdir().unwrap();
  drop(TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(true)).unwrap());
  let err = TileDataset::<Height>::open(dir.path(), Polyhedron::Cube, options(false))
    .err()
    .unwrap();
  assert!(matches!(err, TerrainError::FormatMismatch { .. }));
}

#[test]
fn test_tile_size_mismatch() {
  let dir = tempfile::tempdir().unwrap();
  drop(TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(true)).unwrap());
  let err = TileDataset::<Height>::open(
    dir.path(),
    Polyhedron::Plane,
    TileFileOptions::new([5, 5], false),
  )
  .err()
  .unwrap();
  assert!(matches!(err, TerrainError::FormatMismatch { .. }));
}

#[test]
fn test_missing_layout_read_only() {
  let dir = tempfile::tempdir().unwrap();
  let err = TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(false))
    .err()
    .unwrap();
  assert!(matches!(err, TerrainError::Io(_)));
}

#[test]
fn test_layout_nodata_wins() {
  let dir = tempfile::tempdir().unwrap();
  let mut create = options::<Height>(true);
  create.nodata = -1.0;
  drop(TileDataset::open(dir.path(), Polyhedron::Plane, create).unwrap());

  // Reopened with a different default: the stored one is used.
  let dataset = TileDataset::<Height>::open(dir.path(), Polyhedron::Plane, options(false)).unwrap();
  assert_eq!(dataset.nodata(), -1.0);
}

#[test]
fn test_missing_patch_file_reads_as_absent() {
  let dir = tempfile::tempdir().unwrap();
  drop(TileDataset::<Height>::open(dir.path(), Polyhedron::Cube, options(true)).unwrap());
  std::fs::remove_file(dir.path().join(patch_file_name(4))).unwrap();

  let mut dataset =
    TileDataset::<Height>::open(dir.path(), Polyhedron::Cube, options(false)).unwrap();
  assert!(dataset.file(4).is_none());
  assert_eq!(dataset.locate(TreeIndex::root(4)).unwrap(), NO_TILE);
  assert!(dataset.read(4, 0, None).unwrap().is_none());
}
