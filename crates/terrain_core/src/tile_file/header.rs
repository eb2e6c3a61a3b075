//! Fixed-size file header at offset 0 of every tile file.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "QTRF"
//! 4       2     version
//! 6       2     value_bytes    (encoded pixel size)
//! 8       4     header_bytes   (encoded tile header size)
//! 12      4     tile_w
//! 16      4     tile_h
//! 20      4     max_tile_index (NO_TILE when empty)
//! 24      2     kind_id        (which pixel kind wrote the file)
//! 26      2     channels       (components per pixel)
//! 28      V     default pixel value
//! ```

use std::marker::PhantomData;

use crate::constants::{TileIndex, FILE_MAGIC, FILE_VERSION, NO_TILE};
use crate::types::PixelKind;

const FIXED_BYTES: usize = 28;

/// Decoded file header.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader<P: PixelKind> {
  pub version: u16,
  pub value_bytes: u16,
  pub header_bytes: u32,
  pub kind_id: u16,
  pub channels: u16,
  pub tile_size: [u32; 2],
  pub max_tile_index: TileIndex,
  pub nodata: P::Value,
  _kind: PhantomData<P>,
}

impl<P: PixelKind> FileHeader<P> {
  /// Header of a fresh, empty file.
  pub fn new(tile_size: [u32; 2], nodata: P::Value) -> Self {
    Self {
      version: FILE_VERSION,
      value_bytes: P::VALUE_BYTES as u16,
      header_bytes: P::HEADER_BYTES as u32,
      kind_id: P::KIND_ID,
      channels: P::CHANNELS as u16,
      tile_size,
      max_tile_index: NO_TILE,
      nodata,
      _kind: PhantomData,
    }
  }

  /// Encoded size; also the offset of record 0.
  #[inline]
  pub const fn encoded_len() -> usize {
    FIXED_BYTES + P::VALUE_BYTES
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut out = vec![0u8; Self::encoded_len()];
    out[0..4].copy_from_slice(&FILE_MAGIC);
    out[4..6].copy_from_slice(&self.version.to_le_bytes());
    out[6..8].copy_from_slice(&self.value_bytes.to_le_bytes());
    out[8..12].copy_from_slice(&self.header_bytes.to_le_bytes());
    out[12..16].copy_from_slice(&self.tile_size[0].to_le_bytes());
    out[16..20].copy_from_slice(&self.tile_size[1].to_le_bytes());
    out[20..24].copy_from_slice(&self.max_tile_index.to_le_bytes());
    out[24..26].copy_from_slice(&self.kind_id.to_le_bytes());
    out[26..28].copy_from_slice(&self.channels.to_le_bytes());
    P::encode_value(self.nodata, &mut out[FIXED_BYTES..]);
    out
  }

  /// Decode, returning a description of the first inconsistency found.
  pub fn decode(bytes: &[u8]) -> Result<Self, String> {
    if bytes.len() < FIXED_BYTES {
      return Err(format!("truncated header ({} bytes)", bytes.len()));
    }
    if bytes[0..4] != FILE_MAGIC {
      return Err("bad magic".into());
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FILE_VERSION {
      return Err(format!("unsupported version {version}"));
    }
    let value_bytes = u16::from_le_bytes([bytes[6], bytes[7]]);
    if value_bytes as usize != P::VALUE_BYTES {
      return Err(format!(
        "pixel size {value_bytes} does not match {} ({} bytes)",
        P::TYPE_NAME,
        P::VALUE_BYTES
      ));
    }
    let header_bytes = read_u32(&bytes[8..12]);
    if header_bytes as usize != P::HEADER_BYTES {
      return Err(format!(
        "tile header size {header_bytes} does not match {} ({} bytes)",
        P::TYPE_NAME,
        P::HEADER_BYTES
      ));
    }
    let kind_id = u16::from_le_bytes([bytes[24], bytes[25]]);
    let channels = u16::from_le_bytes([bytes[26], bytes[27]]);
    if kind_id != P::KIND_ID || channels as usize != P::CHANNELS {
      return Err(format!(
        "pixel kind {kind_id} with {channels} channels does not match {} (kind {}, {} channels)",
        P::TYPE_NAME,
        P::KIND_ID,
        P::CHANNELS
      ));
    }
    if bytes.len() < Self::encoded_len() {
      return Err("truncated default pixel".into());
    }
    Ok(Self {
      version,
      value_bytes,
      header_bytes,
      kind_id,
      channels,
      tile_size: [read_u32(&bytes[12..16]), read_u32(&bytes[16..20])],
      max_tile_index: read_u32(&bytes[20..24]),
      nodata: P::decode_value(&bytes[FIXED_BYTES..Self::encoded_len()]),
      _kind: PhantomData,
    })
  }

  /// Number of records the header advertises.
  #[inline]
  pub fn tile_count(&self) -> u64 {
    if self.max_tile_index == NO_TILE {
      0
    } else {
      self.max_tile_index as u64 + 1
    }
  }
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
  u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
