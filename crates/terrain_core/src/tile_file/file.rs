//! TileFile - random-access store for one quadtree's fixed-size tiles.
//!
//! Records are never moved once appended, so a tile index is a stable
//! address. Only the file header (tile dimensions, nodata value and
//! `max_tile_index`) is rewritten in place; a record is always written before
//! the header advertises it, so a lost header update forgets tiles but never
//! corrupts payload bytes.
//!
//! Writes are not synchronized: callers serialize appends/writes externally.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::header::{read_u32, FileHeader};
use crate::constants::{TileIndex, CHILD_POINTER_BYTES, NO_TILE};
use crate::error::{Result, TerrainError};
use crate::index::TreeIndex;
use crate::types::PixelKind;

/// Child pointers and typed header of one record.
#[derive(Debug, Clone, Copy)]
pub struct TileMeta<P: PixelKind> {
  pub children: [TileIndex; 4],
  pub header: P::Header,
}

impl<P: PixelKind> TileMeta<P> {
  /// True if any child pointer is set.
  pub fn has_children(&self) -> bool {
    self.children.iter().any(|&c| c != NO_TILE)
  }
}

/// Options for [`TileFile::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct TileFileOptions<P: PixelKind> {
  /// Tile width and height in pixels.
  pub tile_size: [u32; 2],
  /// Open for writing, creating the file if absent.
  pub writable: bool,
  /// Nodata value written into a newly created file.
  pub nodata: P::Value,
  /// Flush the header after this many appends (0 = only on flush/drop).
  pub header_flush_interval: u32,
}

impl<P: PixelKind> TileFileOptions<P> {
  pub fn new(tile_size: [u32; 2], writable: bool) -> Self {
    Self {
      tile_size,
      writable,
      nodata: P::default_nodata(),
      header_flush_interval: 0,
    }
  }
}

/// Binary tiled store for one quadtree.
pub struct TileFile<P: PixelKind> {
  path: PathBuf,
  file: File,
  writable: bool,
  header: FileHeader<P>,
  header_dirty: bool,
  appends_since_flush: u32,
  header_flush_interval: u32,
  scratch: Vec<u8>,
}

impl<P: PixelKind> TileFile<P> {
  /// Open (or create, if `writable`) a tile file with the given tile size.
  pub fn open(path: impl AsRef<Path>, tile_size: [u32; 2], writable: bool) -> Result<Self> {
    Self::open_with(path, TileFileOptions::new(tile_size, writable))
  }

  /// Open with explicit options.
  ///
  /// An existing file must agree with `P` and `options.tile_size`, otherwise
  /// the call fails with [`TerrainError::FormatMismatch`].
  pub fn open_with(path: impl AsRef<Path>, options: TileFileOptions<P>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    if options.tile_size[0] == 0 || options.tile_size[1] == 0 {
      return Err(TerrainError::mismatch(&path, "tile size must be non-zero"));
    }

    let exists = path.exists();
    if !exists && !options.writable {
      return Err(TerrainError::Io(std::io::Error::new(
        ErrorKind::NotFound,
        format!("tile file {} does not exist", path.display()),
      )));
    }

    let mut file = OpenOptions::new()
      .read(true)
      .write(options.writable)
      .create(options.writable)
      .open(&path)?;

    let header = if exists {
      let header = Self::read_header(&mut file, &path)?;
      if header.tile_size != options.tile_size {
        return Err(TerrainError::mismatch(
          &path,
          format!(
            "tile size {:?} does not match requested {:?}",
            header.tile_size, options.tile_size
          ),
        ));
      }
      debug!(
        path = %path.display(),
        tiles = header.tile_count(),
        "opened tile file"
      );
      header
    } else {
      let header = FileHeader::<P>::new(options.tile_size, options.nodata);
      file.write_all(&header.encode())?;
      debug!(path = %path.display(), kind = P::TYPE_NAME, "created tile file");
      header
    };

    let mut tile_file = Self {
      path,
      file,
      writable: options.writable,
      header,
      header_dirty: false,
      appends_since_flush: 0,
      header_flush_interval: options.header_flush_interval,
      scratch: Vec::new(),
    };
    tile_file.check_length()?;
    Ok(tile_file)
  }

  fn read_header(file: &mut File, path: &Path) -> Result<FileHeader<P>> {
    let mut bytes = vec![0u8; FileHeader::<P>::encoded_len()];
    file.seek(SeekFrom::Start(0))?;
    match file.read_exact(&mut bytes) {
      Ok(()) => {}
      Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
        return Err(TerrainError::mismatch(path, "file shorter than its header"));
      }
      Err(err) => return Err(err.into()),
    }
    FileHeader::<P>::decode(&bytes).map_err(|detail| TerrainError::mismatch(path, detail))
  }

  /// The header must not advertise records the file does not hold.
  fn check_length(&mut self) -> Result<()> {
    let needed = self.tile_data_offset() + self.header.tile_count() * self.record_size();
    let len = self.file.metadata()?.len();
    if len < needed {
      return Err(TerrainError::mismatch(
        &self.path,
        format!("header advertises {} tiles but file holds {len} bytes", self.header.tile_count()),
      ));
    }
    Ok(())
  }

  // ===========================================================================
  // Shape
  // ===========================================================================

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn is_writable(&self) -> bool {
    self.writable
  }

  pub fn tile_size(&self) -> [u32; 2] {
    self.header.tile_size
  }

  /// Pixels per tile payload.
  #[inline]
  pub fn tile_pixels(&self) -> usize {
    self.header.tile_size[0] as usize * self.header.tile_size[1] as usize
  }

  /// Default (nodata) pixel value.
  pub fn nodata(&self) -> P::Value {
    self.header.nodata
  }

  /// Highest tile index in use, or [`NO_TILE`] for an empty file.
  pub fn max_tile_index(&self) -> TileIndex {
    self.header.max_tile_index
  }

  pub fn tile_count(&self) -> u64 {
    self.header.tile_count()
  }

  /// Bytes per record: child pointers + tile header + payload.
  #[inline]
  pub fn record_size(&self) -> u64 {
    (CHILD_POINTER_BYTES + P::HEADER_BYTES + self.tile_pixels() * P::VALUE_BYTES) as u64
  }

  #[inline]
  pub fn tile_data_offset(&self) -> u64 {
    FileHeader::<P>::encoded_len() as u64
  }

  #[inline]
  fn record_offset(&self, index: TileIndex) -> u64 {
    self.tile_data_offset() + index as u64 * self.record_size()
  }

  /// True if `index` names a record in `[0, max_tile_index]`.
  #[inline]
  pub fn contains(&self, index: TileIndex) -> bool {
    index != NO_TILE && self.header.max_tile_index != NO_TILE && index <= self.header.max_tile_index
  }

  // ===========================================================================
  // Records
  // ===========================================================================

  /// Reserve a new record and return its index.
  ///
  /// Children start as [`NO_TILE`] and the header as its default. With
  /// `blank_fill` the payload is filled with the nodata value; otherwise its
  /// bytes are zero.
  pub fn append_tile(&mut self, blank_fill: bool) -> Result<TileIndex> {
    self.ensure_writable()?;
    let index = match self.header.max_tile_index {
      NO_TILE => 0,
      max if max + 1 == NO_TILE => {
        return Err(TerrainError::InvalidIndex(format!(
          "{} is full",
          self.path.display()
        )));
      }
      max => max + 1,
    };

    let offset = self.record_offset(index);
    let meta_bytes = CHILD_POINTER_BYTES + P::HEADER_BYTES;
    let payload_bytes = self.tile_pixels() * P::VALUE_BYTES;
    let record_len = if blank_fill {
      meta_bytes + payload_bytes
    } else {
      meta_bytes
    };

    self.scratch.clear();
    self.scratch.resize(record_len, 0);
    encode_children(&[NO_TILE; 4], &mut self.scratch[..CHILD_POINTER_BYTES]);
    P::encode_header(
      &P::Header::default(),
      &mut self.scratch[CHILD_POINTER_BYTES..meta_bytes],
    );
    if blank_fill {
      let nodata = self.header.nodata;
      for chunk in self.scratch[meta_bytes..].chunks_exact_mut(P::VALUE_BYTES) {
        P::encode_value(nodata, chunk);
      }
    }

    self.file.seek(SeekFrom::Start(offset))?;
    self.file.write_all(&self.scratch)?;
    let end = offset + self.record_size();
    if self.file.metadata()?.len() < end {
      self.file.set_len(end)?;
    }

    // The record is on disk; only now advertise it.
    self.header.max_tile_index = index;
    self.header_dirty = true;
    self.appends_since_flush += 1;
    if self.header_flush_interval > 0 && self.appends_since_flush >= self.header_flush_interval {
      self.flush_header()?;
    }
    Ok(index)
  }

  /// Read a record. `None` means "not present", never an error.
  ///
  /// When `payload` is given it must hold exactly one tile of pixels.
  pub fn read_tile(
    &mut self,
    index: TileIndex,
    payload: Option<&mut [P::Value]>,
  ) -> Result<Option<TileMeta<P>>> {
    if !self.contains(index) {
      return Ok(None);
    }
    let offset = self.record_offset(index);
    let meta_bytes = CHILD_POINTER_BYTES + P::HEADER_BYTES;
    let payload_bytes = match &payload {
      Some(out) => {
        self.check_payload_len(out.len())?;
        self.tile_pixels() * P::VALUE_BYTES
      }
      None => 0,
    };

    self.scratch.clear();
    self.scratch.resize(meta_bytes + payload_bytes, 0);
    self.file.seek(SeekFrom::Start(offset))?;
    self.file.read_exact(&mut self.scratch)?;

    let meta = decode_meta::<P>(&self.scratch[..meta_bytes]);
    if let Some(out) = payload {
      for (value, chunk) in out
        .iter_mut()
        .zip(self.scratch[meta_bytes..].chunks_exact(P::VALUE_BYTES))
      {
        *value = P::decode_value(chunk);
      }
    }
    Ok(Some(meta))
  }

  /// Child pointers of a record, or `None` if not present.
  pub fn read_children(&mut self, index: TileIndex) -> Result<Option<[TileIndex; 4]>> {
    if !self.contains(index) {
      return Ok(None);
    }
    let mut bytes = [0u8; CHILD_POINTER_BYTES];
    self.file.seek(SeekFrom::Start(self.record_offset(index)))?;
    self.file.read_exact(&mut bytes)?;
    Ok(Some(decode_children(&bytes)))
  }

  /// Overwrite a record in place. `payload: None` leaves the pixels as they
  /// are.
  pub fn write_tile(
    &mut self,
    index: TileIndex,
    children: &[TileIndex; 4],
    header: &P::Header,
    payload: Option<&[P::Value]>,
  ) -> Result<()> {
    self.ensure_writable()?;
    self.ensure_present(index)?;
    let meta_bytes = CHILD_POINTER_BYTES + P::HEADER_BYTES;
    let payload_bytes = match payload {
      Some(values) => {
        self.check_payload_len(values.len())?;
        values.len() * P::VALUE_BYTES
      }
      None => 0,
    };

    self.scratch.clear();
    self.scratch.resize(meta_bytes + payload_bytes, 0);
    encode_children(children, &mut self.scratch[..CHILD_POINTER_BYTES]);
    P::encode_header(header, &mut self.scratch[CHILD_POINTER_BYTES..meta_bytes]);
    if let Some(values) = payload {
      for (value, chunk) in values
        .iter()
        .zip(self.scratch[meta_bytes..].chunks_exact_mut(P::VALUE_BYTES))
      {
        P::encode_value(*value, chunk);
      }
    }

    let offset = self.record_offset(index);
    self.file.seek(SeekFrom::Start(offset))?;
    self.file.write_all(&self.scratch)?;
    Ok(())
  }

  /// Overwrite only the child pointers of a record.
  pub fn write_children(&mut self, index: TileIndex, children: &[TileIndex; 4]) -> Result<()> {
    self.ensure_writable()?;
    self.ensure_present(index)?;
    let mut bytes = [0u8; CHILD_POINTER_BYTES];
    encode_children(children, &mut bytes);
    self.file.seek(SeekFrom::Start(self.record_offset(index)))?;
    self.file.write_all(&bytes)?;
    Ok(())
  }

  /// Append a record and link it as child `which` of `parent`.
  ///
  /// The child record is written before the parent's pointer.
  pub fn append_child(
    &mut self,
    parent: TileIndex,
    which: u8,
    header: &P::Header,
    payload: &[P::Value],
  ) -> Result<TileIndex> {
    if which > 3 {
      return Err(TerrainError::InvalidIndex(format!(
        "child selector {which} out of range 0..=3"
      )));
    }
    let mut children = self
      .read_children(parent)?
      .ok_or_else(|| TerrainError::InvalidIndex(format!("parent tile {parent} not present")))?;
    let child = self.append_tile(false)?;
    self.write_tile(child, &[NO_TILE; 4], header, Some(payload))?;
    children[which as usize] = child;
    self.write_children(parent, &children)?;
    Ok(child)
  }

  // ===========================================================================
  // Path lookup
  // ===========================================================================

  /// Locate the record for `index` by walking child pointers from `start`
  /// (the record of `index`'s root). Returns [`NO_TILE`] as soon as a
  /// required pointer is absent.
  pub fn check_tile(&mut self, index: TreeIndex, start: TileIndex) -> Result<TileIndex> {
    if !index.is_valid() {
      return Ok(NO_TILE);
    }
    self.check_path(start, index.digits())
  }

  /// Walk an explicit sequence of child selectors from `start`.
  pub fn check_path(
    &mut self,
    start: TileIndex,
    digits: impl IntoIterator<Item = u8>,
  ) -> Result<TileIndex> {
    if !self.contains(start) {
      return Ok(NO_TILE);
    }
    let mut current = start;
    for digit in digits {
      let Some(children) = self.read_children(current)? else {
        return Ok(NO_TILE);
      };
      let next = children[(digit & 3) as usize];
      if !self.contains(next) {
        return Ok(NO_TILE);
      }
      current = next;
    }
    Ok(current)
  }

  // ===========================================================================
  // Persistence
  // ===========================================================================

  /// Persist the header if it changed since the last flush.
  pub fn flush(&mut self) -> Result<()> {
    if self.header_dirty {
      self.flush_header()?;
    }
    Ok(())
  }

  /// Persist the header (directory state).
  pub fn flush_header(&mut self) -> Result<()> {
    self.ensure_writable()?;
    let bytes = self.header.encode();
    self.file.seek(SeekFrom::Start(0))?;
    self.file.write_all(&bytes)?;
    self.header_dirty = false;
    self.appends_since_flush = 0;
    Ok(())
  }

  /// Flush the header and ask the OS to persist everything.
  pub fn sync(&mut self) -> Result<()> {
    if self.writable {
      self.flush_header()?;
      self.file.sync_all()?;
    }
    Ok(())
  }

  fn ensure_writable(&self) -> Result<()> {
    if self.writable {
      Ok(())
    } else {
      Err(TerrainError::Io(std::io::Error::new(
        ErrorKind::PermissionDenied,
        format!("{} opened read-only", self.path.display()),
      )))
    }
  }

  fn ensure_present(&self, index: TileIndex) -> Result<()> {
    if self.contains(index) {
      Ok(())
    } else {
      Err(TerrainError::InvalidIndex(format!(
        "tile {index} not present in {} ({} tiles)",
        self.path.display(),
        self.header.tile_count()
      )))
    }
  }

  fn check_payload_len(&self, len: usize) -> Result<()> {
    if len == self.tile_pixels() {
      Ok(())
    } else {
      Err(TerrainError::InvalidIndex(format!(
        "payload of {len} pixels, tile holds {}",
        self.tile_pixels()
      )))
    }
  }
}

impl<P: PixelKind> Drop for TileFile<P> {
  fn drop(&mut self) {
    if self.writable && self.header_dirty {
      if let Err(err) = self.flush_header() {
        warn!(path = %self.path.display(), error = %err, "failed to flush tile file header");
      }
    }
  }
}

fn decode_children(bytes: &[u8]) -> [TileIndex; 4] {
  [
    read_u32(&bytes[0..4]),
    read_u32(&bytes[4..8]),
    read_u32(&bytes[8..12]),
    read_u32(&bytes[12..16]),
  ]
}

fn encode_children(children: &[TileIndex; 4], out: &mut [u8]) {
  for (child, chunk) in children.iter().zip(out.chunks_exact_mut(4)) {
    chunk.copy_from_slice(&child.to_le_bytes());
  }
}

fn decode_meta<P: PixelKind>(bytes: &[u8]) -> TileMeta<P> {
  TileMeta {
    children: decode_children(&bytes[..CHILD_POINTER_BYTES]),
    header: P::decode_header(&bytes[CHILD_POINTER_BYTES..]),
  }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod file_test;
