//! Producers of tile payloads.
//!
//! A [`TileSource`] fills a payload for one node. The fetch stage calls it
//! either inline during the drain or from a worker thread, so sources must be
//! `Send + Sync` and do their own locking.

use std::sync::Mutex;

use tracing::trace;

use super::request::TileHint;
use crate::constants::{TileIndex, NO_TILE};
use crate::error::{Result, TerrainError};
use crate::index::TreeIndex;
use crate::tile_file::TileDataset;
use crate::types::PixelKind;

/// Cached content of one channel for one node.
#[derive(Clone, Debug)]
pub struct TileData<P: PixelKind> {
  /// Record the data came from, [`NO_TILE`] if blank or generated.
  pub tile: TileIndex,
  /// Child pointers of that record.
  pub children: [TileIndex; 4],
  pub header: P::Header,
  pub payload: Vec<P::Value>,
}

impl<P: PixelKind> TileData<P> {
  /// Blank data with a payload of `pixels` nodata samples.
  pub fn new(pixels: usize, nodata: P::Value) -> Self {
    Self {
      tile: NO_TILE,
      children: [NO_TILE; 4],
      header: P::Header::default(),
      payload: vec![nodata; pixels],
    }
  }

  /// Placeholder left in a cache slot while its data is on a worker.
  pub fn empty() -> Self {
    Self::new(0, P::default_nodata())
  }

  /// Reset to "no record": nodata payload, no children.
  pub fn blank(&mut self, nodata: P::Value) {
    self.tile = NO_TILE;
    self.children = [NO_TILE; 4];
    self.header = P::Header::default();
    self.payload.fill(nodata);
  }

  pub fn has_children(&self) -> bool {
    self.children.iter().any(|&c| c != NO_TILE)
  }
}

/// What a source is asked to produce.
#[derive(Clone, Debug)]
pub struct FetchTarget<S> {
  pub index: TreeIndex,
  pub scope: S,
  pub hint: TileHint,
}

/// Fills tile data for nodes of one channel.
pub trait TileSource<P: PixelKind, S>: Send + Sync {
  /// Payload length every fill produces.
  fn tile_pixels(&self) -> usize;

  fn nodata(&self) -> P::Value;

  /// Overwrite `data` with the content for `target`. `data.payload` is
  /// already `tile_pixels()` long.
  fn fill(&self, target: &FetchTarget<S>, data: &mut TileData<P>) -> Result<()>;

  /// True if `data` (the content of `index`) has deeper data below it.
  fn can_refine(&self, index: TreeIndex, data: &TileData<P>) -> bool;
}

// =============================================================================
// Dataset-backed source
// =============================================================================

/// Reads tiles from a [`TileDataset`], using parent child pointers as hints.
pub struct TileFileSource<P: PixelKind> {
  dataset: Mutex<TileDataset<P>>,
  pixels: usize,
  nodata: P::Value,
}

impl<P: PixelKind> TileFileSource<P> {
  pub fn new(dataset: TileDataset<P>) -> Self {
    Self {
      pixels: dataset.tile_pixels(),
      nodata: dataset.nodata(),
      dataset: Mutex::new(dataset),
    }
  }

  /// Give the dataset back, e.g. to append more tiles.
  pub fn into_inner(self) -> Result<TileDataset<P>> {
    self.dataset.into_inner().map_err(|_| poisoned())
  }
}

fn poisoned() -> TerrainError {
  TerrainError::Fetch("tile dataset lock poisoned".into())
}

impl<P: PixelKind, S> TileSource<P, S> for TileFileSource<P> {
  fn tile_pixels(&self) -> usize {
    self.pixels
  }

  fn nodata(&self) -> P::Value {
    self.nodata
  }

  fn fill(&self, target: &FetchTarget<S>, data: &mut TileData<P>) -> Result<()> {
    let mut dataset = self.dataset.lock().map_err(|_| poisoned())?;
    let tile = match target.hint {
      TileHint::At(tile) => tile,
      TileHint::Absent => NO_TILE,
      TileHint::Unknown => dataset.locate(target.index)?,
    };
    if tile == NO_TILE {
      data.blank(self.nodata);
      return Ok(());
    }

    match dataset.read(target.index.patch(), tile, Some(&mut data.payload))? {
      Some(meta) => {
        data.tile = tile;
        data.children = meta.children;
        data.header = meta.header;
      }
      None => {
        trace!(index = %target.index, tile, "record not present, blank fill");
        data.blank(self.nodata);
      }
    }
    Ok(())
  }

  fn can_refine(&self, _index: TreeIndex, data: &TileData<P>) -> bool {
    data.has_children()
  }
}

// =============================================================================
// Procedural source
// =============================================================================

/// Generates tiles from a closure, down to a fixed depth.
pub struct ProceduralSource<P: PixelKind, F> {
  generate: F,
  pixels: usize,
  nodata: P::Value,
  max_level: u8,
}

impl<P: PixelKind, F> ProceduralSource<P, F> {
  /// `generate(index, scope, payload)` writes one tile; the payload starts
  /// out as nodata.
  pub fn new(tile_size: [u32; 2], nodata: P::Value, max_level: u8, generate: F) -> Self {
    Self {
      generate,
      pixels: tile_size[0] as usize * tile_size[1] as usize,
      nodata,
      max_level,
    }
  }
}

impl<P, S, F> TileSource<P, S> for ProceduralSource<P, F>
where
  P: PixelKind,
  F: Fn(TreeIndex, &S, &mut [P::Value]) + Send + Sync,
{
  fn tile_pixels(&self) -> usize {
    self.pixels
  }

  fn nodata(&self) -> P::Value {
    self.nodata
  }

  fn fill(&self, target: &FetchTarget<S>, data: &mut TileData<P>) -> Result<()> {
    data.blank(self.nodata);
    (self.generate)(target.index, &target.scope, &mut data.payload);
    data.header = P::compute_header(&data.payload, self.nodata);
    Ok(())
  }

  fn can_refine(&self, index: TreeIndex, _data: &TileData<P>) -> bool {
    index.level() < self.max_level
  }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
