//! Engine configuration, read from TOML.
//!
//! Every field has a default, so a config file only names what it changes:
//!
//! ```toml
//! [cache]
//! dem_buffers = 2048
//! policy = "protect_current_and_previous"
//!
//! [fetch]
//! budget_us = 250
//! worker_threads = 2
//!
//! [tree]
//! split_above = 0.25
//!
//! [data]
//! polyhedron = "cube"
//! size = 6371000.0
//! dem = "data/dem"
//! layers = ["data/slope"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::EvictionPolicy;
use crate::constants::{DEFAULT_DRAIN_BUDGET_US, DEFAULT_TILE_SIZE};
use crate::error::{Result, TerrainError};
use crate::tree::{Polyhedron, TreeConfig};

/// Root configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
  pub cache: CacheConfig,
  pub fetch: FetchConfig,
  pub tree: TreeConfig,
  pub data: DataConfig,
}

/// Buffer counts per channel and the eviction policy they share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub dem_buffers: usize,
  pub color_buffers: usize,
  /// Per layer.
  pub layer_buffers: usize,
  pub policy: EvictionPolicy,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dem_buffers: 1024,
      color_buffers: 1024,
      layer_buffers: 256,
      policy: EvictionPolicy::default(),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  /// Per-frame drain budget in microseconds.
  pub budget_us: u64,
  /// Background fill threads per channel (0 = fill during the drain).
  pub worker_threads: usize,
  /// Fills a channel may have on workers at once.
  pub max_in_flight: usize,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      budget_us: DEFAULT_DRAIN_BUDGET_US,
      worker_threads: 0,
      max_in_flight: 64,
    }
  }
}

impl FetchConfig {
  pub fn budget(&self) -> Duration {
    Duration::from_micros(self.budget_us)
  }
}

/// Where the datasets live and how they are shaped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
  /// `plane`, `cube` or `triacontahedron`.
  pub polyhedron: String,
  /// Plane edge length or sphere radius.
  pub size: f64,
  pub tile_size: [u32; 2],
  /// Appends between header flushes when writing (0 = on flush only).
  pub header_flush_interval: u32,
  pub dem: PathBuf,
  pub color: Option<PathBuf>,
  pub layers: Vec<PathBuf>,
}

impl Default for DataConfig {
  fn default() -> Self {
    Self {
      polyhedron: Polyhedron::Plane.name().to_string(),
      size: 1.0,
      tile_size: [DEFAULT_TILE_SIZE; 2],
      header_flush_interval: 0,
      dem: PathBuf::from("dem"),
      color: None,
      layers: Vec::new(),
    }
  }
}

impl DataConfig {
  pub fn polyhedron(&self) -> Result<Polyhedron> {
    Polyhedron::from_name(&self.polyhedron)
      .ok_or_else(|| TerrainError::Config(format!("unknown polyhedron {:?}", self.polyhedron)))
  }

  /// Resolve relative dataset paths against `base`.
  pub fn resolve(&mut self, base: &Path) {
    let join = |path: &mut PathBuf| {
      if path.is_relative() {
        *path = base.join(&*path);
      }
    };
    join(&mut self.dem);
    if let Some(color) = self.color.as_mut() {
      join(color);
    }
    self.layers.iter_mut().for_each(join);
  }
}

impl TerrainConfig {
  /// Load from a TOML file. Dataset paths are relative to the file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut config = Self::from_toml_str(&text)?;
    if let Some(base) = path.parent() {
      config.data.resolve(base);
    }
    Ok(config)
  }

  pub fn from_toml_str(text: &str) -> Result<Self> {
    let config: Self = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn to_toml_string(&self) -> Result<String> {
    Ok(toml::to_string_pretty(self)?)
  }

  /// Reject values the engine cannot run with.
  pub fn validate(&self) -> Result<()> {
    self.data.polyhedron()?;
    if self.data.tile_size.contains(&0) {
      return Err(TerrainError::Config("tile_size must be non-zero".into()));
    }
    if self.cache.dem_buffers == 0 {
      return Err(TerrainError::Config("dem_buffers must be non-zero".into()));
    }
    if self.tree.merge_below > self.tree.split_above {
      return Err(TerrainError::Config(format!(
        "merge_below {} exceeds split_above {}",
        self.tree.merge_below, self.tree.split_above
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
