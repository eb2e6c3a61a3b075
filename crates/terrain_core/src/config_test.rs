use super::*;

#[test]
fn test_empty_file_uses_defaults() {
  let config = TerrainConfig::from_toml_str("").unwrap();
  assert_eq!(config, TerrainConfig::default());
  assert_eq!(config.fetch.budget(), Duration::from_micros(DEFAULT_DRAIN_BUDGET_US));
  assert_eq!(config.tree, TreeConfig::DEFAULT);
  assert_eq!(config.data.polyhedron().unwrap(), Polyhedron::Plane);
}

#[test]
fn test_partial_sections() {
  let config = TerrainConfig::from_toml_str(
    r#"
      [cache]
      dem_buffers = 16
      policy = "protect_current_and_previous"

      [fetch]
      worker_threads = 2

      [tree]
      split_above = 0.25
      max_level = 12

      [data]
      polyhedron = "Cube"
      color = "color"
      layers = ["slope", "snow"]
    "#,
  )
  .unwrap();
  assert_eq!(config.cache.dem_buffers, 16);
  assert_eq!(config.cache.color_buffers, 1024);
  assert_eq!(config.cache.policy, EvictionPolicy::ProtectCurrentAndPrevious);
  assert_eq!(config.fetch.worker_threads, 2);
  assert_eq!(config.fetch.budget_us, DEFAULT_DRAIN_BUDGET_US);
  assert_eq!(config.tree.split_above, 0.25);
  assert_eq!(config.tree.merge_below, TreeConfig::DEFAULT.merge_below);
  assert_eq!(config.tree.max_level, 12);
  assert_eq!(config.data.polyhedron().unwrap(), Polyhedron::Cube);
  assert_eq!(config.data.layers.len(), 2);
}

#[test]
fn test_round_trip_through_toml() {
  let mut config = TerrainConfig::default();
  config.data.color = Some(PathBuf::from("color"));
  config.fetch.worker_threads = 3;
  let text = config.to_toml_string().unwrap();
  assert_eq!(TerrainConfig::from_toml_str(&text).unwrap(), config);
}

#[test]
fn test_rejects_bad_values() {
  let cases = [
    "[data]\npolyhedron = \"dodecahedron\"",
    "[data]\ntile_size = [0, 65]",
    "[cache]\ndem_buffers = 0",
    "[tree]\nsplit_above = -1.0\nmerge_below = 0.0",
    "[cache]\npolicy = \"random\"",
  ];
  for text in cases {
    let err = TerrainConfig::from_toml_str(text).unwrap_err();
    assert!(matches!(err, TerrainError::Config(_)), "{text}: {err}");
  }
}

#[test]
fn test_load_resolves_paths_against_file() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("terrain.toml");
  std::fs::write(&path, "[data]\ndem = \"dem\"\nlayers = [\"/abs/slope\"]\n").unwrap();

  let config = TerrainConfig::load(&path).unwrap();
  assert_eq!(config.data.dem, dir.path().join("dem"));
  assert_eq!(config.data.layers[0], PathBuf::from("/abs/slope"));
}

#[test]
fn test_load_missing_file_is_io_error() {
  let dir = tempfile::tempdir().unwrap();
  let err = TerrainConfig::load(dir.path().join("absent.toml")).unwrap_err();
  assert!(matches!(err, TerrainError::Io(_)));
}
