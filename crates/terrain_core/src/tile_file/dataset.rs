//! TileDataset - a directory of per-patch tile files plus a layout file.
//!
//! ```text
//! dataset/
//!   layout.toml       data_type, num_channels, nodata, polyhedron, tile_size
//!   patch_00.qtf      root patch 0 (root tile is record 0)
//!   patch_01.qtf
//!   ...
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file::{TileFile, TileFileOptions, TileMeta};
use crate::constants::{patch_file_name, TileIndex, LAYOUT_FILE_NAME, NO_TILE};
use crate::error::{Result, TerrainError};
use crate::index::TreeIndex;
use crate::tree::Polyhedron;
use crate::types::PixelKind;

/// Contents of `layout.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetLayout {
  /// Pixel kind name, e.g. `"Height"`.
  pub data_type: String,
  pub num_channels: usize,
  /// Nodata value, one entry per channel.
  pub nodata: Vec<f64>,
  /// Root patch layout name.
  pub polyhedron: String,
  pub tile_size: [u32; 2],
}

impl DatasetLayout {
  pub fn new<P: PixelKind>(polyhedron: Polyhedron, tile_size: [u32; 2], nodata: P::Value) -> Self {
    Self {
      data_type: P::TYPE_NAME.to_string(),
      num_channels: P::CHANNELS,
      nodata: P::to_components(nodata),
      polyhedron: polyhedron.name().to_string(),
      tile_size,
    }
  }

  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Check against the compiled pixel kind and the requested shape, returning
  /// the decoded nodata value.
  pub fn validate<P: PixelKind>(
    &self,
    path: &Path,
    polyhedron: Polyhedron,
    tile_size: [u32; 2],
  ) -> Result<P::Value> {
    if self.data_type != P::TYPE_NAME || self.num_channels != P::CHANNELS {
      return Err(TerrainError::mismatch(
        path,
        format!(
          "dataset holds {} x{}, expected {} x{}",
          self.data_type,
          self.num_channels,
          P::TYPE_NAME,
          P::CHANNELS
        ),
      ));
    }
    if Polyhedron::from_name(&self.polyhedron) != Some(polyhedron) {
      return Err(TerrainError::mismatch(
        path,
        format!("polyhedron {:?}, expected {}", self.polyhedron, polyhedron.name()),
      ));
    }
    if self.tile_size != tile_size {
      return Err(TerrainError::mismatch(
        path,
        format!("tile size {:?}, expected {:?}", self.tile_size, tile_size),
      ));
    }
    P::from_components(&self.nodata)
      .ok_or_else(|| TerrainError::mismatch(path, format!("bad nodata {:?}", self.nodata)))
  }
}

/// One tile file per root patch of a polyhedron.
pub struct TileDataset<P: PixelKind> {
  dir: PathBuf,
  polyhedron: Polyhedron,
  layout: DatasetLayout,
  nodata: P::Value,
  files: Vec<Option<TileFile<P>>>,
}

impl<P: PixelKind> TileDataset<P> {
  /// Open the dataset in `dir`.
  ///
  /// Writable opens create the directory, the layout and every patch file as
  /// needed. Read-only opens require the layout; missing patch files are
  /// treated as empty.
  pub fn open(dir: impl AsRef<Path>, polyhedron: Polyhedron, options: TileFileOptions<P>) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    if options.writable {
      std::fs::create_dir_all(&dir)?;
    }

    let layout_path = dir.join(LAYOUT_FILE_NAME);
    let layout = if layout_path.exists() {
      DatasetLayout::load(&layout_path)?
    } else if options.writable {
      let layout = DatasetLayout::new::<P>(polyhedron, options.tile_size, options.nodata);
      layout.save(&layout_path)?;
      debug!(dir = %dir.display(), kind = P::TYPE_NAME, "created dataset layout");
      layout
    } else {
      return Err(TerrainError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no {LAYOUT_FILE_NAME} in {}", dir.display()),
      )));
    };
    let nodata = layout.validate::<P>(&layout_path, polyhedron, options.tile_size)?;

    let file_options = TileFileOptions { nodata, ..options };
    let mut files = Vec::with_capacity(polyhedron.num_patches());
    for patch in 0..polyhedron.num_patches() {
      let path = dir.join(patch_file_name(patch as u8));
      if options.writable || path.exists() {
        files.push(Some(TileFile::open_with(&path, file_options)?));
      } else {
        files.push(None);
      }
    }

    Ok(Self {
      dir,
      polyhedron,
      layout,
      nodata,
      files,
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn polyhedron(&self) -> Polyhedron {
    self.polyhedron
  }

  pub fn layout(&self) -> &DatasetLayout {
    &self.layout
  }

  pub fn tile_size(&self) -> [u32; 2] {
    self.layout.tile_size
  }

  pub fn tile_pixels(&self) -> usize {
    self.layout.tile_size[0] as usize * self.layout.tile_size[1] as usize
  }

  pub fn nodata(&self) -> P::Value {
    self.nodata
  }

  pub fn file(&self, patch: u8) -> Option<&TileFile<P>> {
    self.files.get(patch as usize).and_then(Option::as_ref)
  }

  pub fn file_mut(&mut self, patch: u8) -> Option<&mut TileFile<P>> {
    self.files.get_mut(patch as usize).and_then(Option::as_mut)
  }

  /// Record of `patch`'s root, appending a blank one if the file is empty.
  pub fn ensure_root(&mut self, patch: u8) -> Result<TileIndex> {
    let file = self
      .file_mut(patch)
      .ok_or_else(|| TerrainError::InvalidIndex(format!("no tile file for patch {patch}")))?;
    if file.contains(0) {
      Ok(0)
    } else {
      file.append_tile(true)
    }
  }

  /// Record holding `index`, or [`NO_TILE`].
  pub fn locate(&mut self, index: TreeIndex) -> Result<TileIndex> {
    if !index.is_valid() {
      return Ok(NO_TILE);
    }
    match self.file_mut(index.patch()) {
      Some(file) => file.check_tile(index, 0),
      None => Ok(NO_TILE),
    }
  }

  /// Read the record at `tile` of `patch`; `None` if not present.
  pub fn read(
    &mut self,
    patch: u8,
    tile: TileIndex,
    payload: Option<&mut [P::Value]>,
  ) -> Result<Option<TileMeta<P>>> {
    match self.file_mut(patch) {
      Some(file) => file.read_tile(tile, payload),
      None => Ok(None),
    }
  }

  /// Persist every header.
  pub fn flush(&mut self) -> Result<()> {
    for file in self.files.iter_mut().flatten() {
      if file.is_writable() {
        file.flush()?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "dataset_test.rs"]
mod dataset_test;
