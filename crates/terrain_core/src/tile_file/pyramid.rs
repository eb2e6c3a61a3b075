//! Offline pyramid construction: leaves from a callback, interior tiles by
//! 2x2 averaging of their children.
//!
//! Tiles share their edge pixels with neighbours, so a parent pixel `x` maps
//! to fine coordinate `2x` across a `2(W-1)+1` wide mosaic of its children:
//!
//! ```text
//!   fine:   0 .. W-1 .. 2(W-1)
//!           └child 0┘└─child 1┘      (column W-1 belongs to both)
//! ```

use rayon::prelude::*;
use tracing::debug;

use super::file::TileFile;
use crate::constants::{TileIndex, NO_TILE};
use crate::error::{Result, TerrainError};
use crate::index::TreeIndex;
use crate::types::PixelKind;

/// Downsample four child payloads (indexed by child selector) into `out`.
pub fn downsample<P: PixelKind>(
  children: [&[P::Value]; 4],
  tile_size: [u32; 2],
  nodata: P::Value,
  out: &mut [P::Value],
) {
  let w = tile_size[0] as usize;
  let h = tile_size[1] as usize;
  debug_assert_eq!(out.len(), w * h);
  debug_assert!(children.iter().all(|c| c.len() == w * h));

  out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
    let (cy, ly) = fine_to_child(2 * y, h);
    let ly1 = (ly + 1).min(h - 1);
    for (x, pixel) in row.iter_mut().enumerate() {
      let (cx, lx) = fine_to_child(2 * x, w);
      let lx1 = (lx + 1).min(w - 1);
      let child = children[cx | (cy << 1)];
      *pixel = P::average4(
        [
          child[ly * w + lx],
          child[ly * w + lx1],
          child[ly1 * w + lx],
          child[ly1 * w + lx1],
        ],
        nodata,
      );
    }
  });
}

/// Child selector bit and local coordinate of a fine mosaic coordinate.
#[inline]
fn fine_to_child(fine: usize, size: usize) -> (usize, usize) {
  let edge = size.saturating_sub(1);
  if fine > edge {
    (1, fine - edge)
  } else {
    (0, fine)
  }
}

/// Write a complete pyramid of `depth` levels below `root` into `file`.
///
/// `leaf_fn` fills every deepest tile, pre-filled with nodata. When
/// `root_tile` is given that record is overwritten; otherwise the root is
/// appended first, so a fresh file gets it at record 0. Returns the root's
/// record.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "pyramid::build"))]
pub fn build_pyramid<P, F>(
  file: &mut TileFile<P>,
  root: TreeIndex,
  root_tile: Option<TileIndex>,
  depth: u8,
  mut leaf_fn: F,
) -> Result<TileIndex>
where
  P: PixelKind,
  F: FnMut(TreeIndex, &mut [P::Value]),
{
  let tile = match root_tile {
    Some(tile) if file.contains(tile) => tile,
    Some(tile) => {
      return Err(TerrainError::InvalidIndex(format!(
        "root tile {tile} not present in {}",
        file.path().display()
      )));
    }
    None => file.append_tile(false)?,
  };
  build_node(file, root, tile, depth, &mut leaf_fn)?;
  file.flush()?;
  debug!(
    path = %file.path().display(),
    root = %root,
    depth,
    tiles = file.tile_count(),
    "built tile pyramid"
  );
  Ok(tile)
}

fn build_node<P, F>(
  file: &mut TileFile<P>,
  index: TreeIndex,
  tile: TileIndex,
  remaining: u8,
  leaf_fn: &mut F,
) -> Result<Vec<P::Value>>
where
  P: PixelKind,
  F: FnMut(TreeIndex, &mut [P::Value]),
{
  let nodata = file.nodata();
  let mut payload = vec![nodata; file.tile_pixels()];
  let mut children = [NO_TILE; 4];

  if remaining == 0 {
    leaf_fn(index, &mut payload);
  } else {
    let mut child_payloads: [Vec<P::Value>; 4] = Default::default();
    for which in 0..4u8 {
      let child_tile = file.append_tile(false)?;
      children[which as usize] = child_tile;
      child_payloads[which as usize] =
        build_node(file, index.down(which)?, child_tile, remaining - 1, leaf_fn)?;
    }
    let [c0, c1, c2, c3] = &child_payloads;
    downsample::<P>(
      [c0.as_slice(), c1.as_slice(), c2.as_slice(), c3.as_slice()],
      file.tile_size(),
      nodata,
      &mut payload,
    );
  }

  let header = P::compute_header(&payload, nodata);
  file.write_tile(tile, &children, &header, Some(&payload))?;
  Ok(payload)
}

#[cfg(test)]
#[path = "pyramid_test.rs"]
mod pyramid_test;
