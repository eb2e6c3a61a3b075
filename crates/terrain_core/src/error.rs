//! Error taxonomy for the terrain engine.
//!
//! "Tile not present" is not an error: reads return `Option::None`.
//! Cache exhaustion has its own type because it is steady-state behaviour
//! under memory pressure and callers are expected to handle it cheaply.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by file, addressing and configuration operations.
#[derive(Debug, Error)]
pub enum TerrainError {
  /// On-disk metadata disagrees with the requested shape or pixel layout.
  #[error("format mismatch in {path}: {detail}")]
  FormatMismatch { path: PathBuf, detail: String },

  /// Contract violation: `up()` on a root, bad child selector, or a tile
  /// index beyond the file's `max_tile_index`.
  #[error("invalid index: {0}")]
  InvalidIndex(String),

  /// Underlying I/O failure.
  #[error("terrain I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Configuration file could not be parsed or serialized.
  #[error("invalid configuration: {0}")]
  Config(String),

  /// A tile source or fetch worker failed outside of file I/O.
  #[error("fetch failed: {0}")]
  Fetch(String),
}

impl TerrainError {
  pub(crate) fn mismatch(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
    Self::FormatMismatch {
      path: path.into(),
      detail: detail.into(),
    }
  }
}

impl From<toml::de::Error> for TerrainError {
  fn from(err: toml::de::Error) -> Self {
    Self::Config(err.to_string())
  }
}

impl From<toml::ser::Error> for TerrainError {
  fn from(err: toml::ser::Error) -> Self {
    Self::Config(err.to_string())
  }
}

/// Returned by [`CacheUnit::grab`](crate::cache::CacheUnit::grab) when every
/// buffer is pinned or too recently used to be repurposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cache exhausted: no evictable buffer among {capacity}")]
pub struct CacheExhausted {
  pub capacity: usize,
}

pub type Result<T, E = TerrainError> = std::result::Result<T, E>;
