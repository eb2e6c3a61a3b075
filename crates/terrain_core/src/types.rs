//! Pixel kinds stored in tiles.
//!
//! Each data channel (elevation, color, auxiliary layer) has its own value
//! type, per-tile header and nodata rules. [`PixelKind`] captures those so the
//! tile file, cache and fetch code is written once.

use std::fmt::Debug;

/// Per-kind pixel behaviour: encoding, nodata handling and averaging.
pub trait PixelKind: Copy + Debug + Send + Sync + 'static {
  /// One pixel.
  type Value: Copy + PartialEq + Debug + Send + Sync + 'static;
  /// Small fixed-size header stored with every tile.
  type Header: Copy + Default + PartialEq + Debug + Send + Sync + 'static;

  /// Name recorded in the dataset layout file.
  const TYPE_NAME: &'static str;
  /// Tag recorded in every tile file header.
  const KIND_ID: u16;
  /// Components per pixel.
  const CHANNELS: usize;
  /// Encoded size of one pixel.
  const VALUE_BYTES: usize;
  /// Encoded size of the tile header.
  const HEADER_BYTES: usize;

  /// Nodata value used when a file does not specify one.
  fn default_nodata() -> Self::Value;

  fn is_nodata(value: Self::Value, nodata: Self::Value) -> bool {
    value == nodata
  }

  /// Average of four samples, skipping nodata. All-nodata yields nodata.
  fn average4(values: [Self::Value; 4], nodata: Self::Value) -> Self::Value;

  fn min(a: Self::Value, b: Self::Value) -> Self::Value;
  fn max(a: Self::Value, b: Self::Value) -> Self::Value;

  /// Little-endian encode into exactly `VALUE_BYTES` bytes.
  fn encode_value(value: Self::Value, out: &mut [u8]);
  fn decode_value(bytes: &[u8]) -> Self::Value;

  /// Little-endian encode into exactly `HEADER_BYTES` bytes.
  fn encode_header(header: &Self::Header, out: &mut [u8]);
  fn decode_header(bytes: &[u8]) -> Self::Header;

  /// Header describing a payload (e.g. its value range).
  fn compute_header(payload: &[Self::Value], nodata: Self::Value) -> Self::Header;

  /// Numeric components, for the text layout file.
  fn to_components(value: Self::Value) -> Vec<f64>;
  fn from_components(components: &[f64]) -> Option<Self::Value>;
}

// =============================================================================
// Scalar value range header
// =============================================================================

/// Min/max of the valid samples in a scalar tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueRange {
  pub min: f32,
  pub max: f32,
}

impl ValueRange {
  /// Range of a tile without valid samples.
  pub const EMPTY: Self = Self {
    min: f32::INFINITY,
    max: f32::NEG_INFINITY,
  };

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.min > self.max
  }

  /// Grow to include `value`.
  #[inline]
  pub fn include(&mut self, value: f32) {
    self.min = self.min.min(value);
    self.max = self.max.max(value);
  }

  /// Union of two ranges.
  pub fn union(&self, other: &Self) -> Self {
    Self {
      min: self.min.min(other.min),
      max: self.max.max(other.max),
    }
  }
}

impl Default for ValueRange {
  fn default() -> Self {
    Self::EMPTY
  }
}

fn scalar_is_nodata(value: f32, nodata: f32) -> bool {
  value == nodata || (value.is_nan() && nodata.is_nan())
}

fn scalar_average4(values: [f32; 4], nodata: f32) -> f32 {
  let mut sum = 0.0f32;
  let mut count = 0u32;
  for v in values {
    if !scalar_is_nodata(v, nodata) {
      sum += v;
      count += 1;
    }
  }
  if count == 0 {
    nodata
  } else {
    sum / count as f32
  }
}

fn scalar_range(payload: &[f32], nodata: f32) -> ValueRange {
  let mut range = ValueRange::EMPTY;
  for &v in payload {
    if !scalar_is_nodata(v, nodata) {
      range.include(v);
    }
  }
  range
}

fn encode_range(range: &ValueRange, out: &mut [u8]) {
  out[0..4].copy_from_slice(&range.min.to_le_bytes());
  out[4..8].copy_from_slice(&range.max.to_le_bytes());
}

fn decode_range(bytes: &[u8]) -> ValueRange {
  ValueRange {
    min: f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    max: f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
  }
}

fn decode_f32(bytes: &[u8]) -> f32 {
  f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// =============================================================================
// Height (DEM)
// =============================================================================

/// Elevation samples in meters.
#[derive(Clone, Copy, Debug)]
pub struct Height;

impl PixelKind for Height {
  type Value = f32;
  type Header = ValueRange;

  const TYPE_NAME: &'static str = "Height";
  const KIND_ID: u16 = 1;
  const CHANNELS: usize = 1;
  const VALUE_BYTES: usize = 4;
  const HEADER_BYTES: usize = 8;

  fn default_nodata() -> f32 {
    -32768.0
  }

  fn is_nodata(value: f32, nodata: f32) -> bool {
    scalar_is_nodata(value, nodata)
  }

  fn average4(values: [f32; 4], nodata: f32) -> f32 {
    scalar_average4(values, nodata)
  }

  fn min(a: f32, b: f32) -> f32 {
    a.min(b)
  }

  fn max(a: f32, b: f32) -> f32 {
    a.max(b)
  }

  fn encode_value(value: f32, out: &mut [u8]) {
    out.copy_from_slice(&value.to_le_bytes());
  }

  fn decode_value(bytes: &[u8]) -> f32 {
    decode_f32(bytes)
  }

  fn encode_header(header: &ValueRange, out: &mut [u8]) {
    encode_range(header, out);
  }

  fn decode_header(bytes: &[u8]) -> ValueRange {
    decode_range(bytes)
  }

  fn compute_header(payload: &[f32], nodata: f32) -> ValueRange {
    scalar_range(payload, nodata)
  }

  fn to_components(value: f32) -> Vec<f64> {
    vec![value as f64]
  }

  fn from_components(components: &[f64]) -> Option<f32> {
    match components {
      [v] => Some(*v as f32),
      _ => None,
    }
  }
}

// =============================================================================
// Color
// =============================================================================

/// 8-bit RGB imagery.
#[derive(Clone, Copy, Debug)]
pub struct Color;

/// Color tiles carry no header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoHeader;

impl PixelKind for Color {
  type Value = [u8; 3];
  type Header = NoHeader;

  const TYPE_NAME: &'static str = "Color";
  const KIND_ID: u16 = 2;
  const CHANNELS: usize = 3;
  const VALUE_BYTES: usize = 3;
  const HEADER_BYTES: usize = 0;

  fn default_nodata() -> [u8; 3] {
    [0, 0, 0]
  }

  fn average4(values: [[u8; 3]; 4], nodata: [u8; 3]) -> [u8; 3] {
    let mut sum = [0u32; 3];
    let mut count = 0u32;
    for v in values {
      if v != nodata {
        for (s, c) in sum.iter_mut().zip(v) {
          *s += c as u32;
        }
        count += 1;
      }
    }
    if count == 0 {
      return nodata;
    }
    // Round half up.
    sum.map(|s| ((s + count / 2) / count) as u8)
  }

  fn min(a: [u8; 3], b: [u8; 3]) -> [u8; 3] {
    [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])]
  }

  fn max(a: [u8; 3], b: [u8; 3]) -> [u8; 3] {
    [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])]
  }

  fn encode_value(value: [u8; 3], out: &mut [u8]) {
    out.copy_from_slice(&value);
  }

  fn decode_value(bytes: &[u8]) -> [u8; 3] {
    [bytes[0], bytes[1], bytes[2]]
  }

  fn encode_header(_header: &NoHeader, _out: &mut [u8]) {}

  fn decode_header(_bytes: &[u8]) -> NoHeader {
    NoHeader
  }

  fn compute_header(_payload: &[[u8; 3]], _nodata: [u8; 3]) -> NoHeader {
    NoHeader
  }

  fn to_components(value: [u8; 3]) -> Vec<f64> {
    value.iter().map(|&c| c as f64).collect()
  }

  fn from_components(components: &[f64]) -> Option<[u8; 3]> {
    match components {
      [r, g, b] => Some([*r as u8, *g as u8, *b as u8]),
      _ => None,
    }
  }
}

// =============================================================================
// Layer
// =============================================================================

/// Auxiliary scalar layer (e.g. land cover weight, temperature).
#[derive(Clone, Copy, Debug)]
pub struct Layer;

impl PixelKind for Layer {
  type Value = f32;
  type Header = ValueRange;

  const TYPE_NAME: &'static str = "Layer";
  const KIND_ID: u16 = 3;
  const CHANNELS: usize = 1;
  const VALUE_BYTES: usize = 4;
  const HEADER_BYTES: usize = 8;

  fn default_nodata() -> f32 {
    f32::MIN
  }

  fn is_nodata(value: f32, nodata: f32) -> bool {
    scalar_is_nodata(value, nodata)
  }

  fn average4(values: [f32; 4], nodata: f32) -> f32 {
    scalar_average4(values, nodata)
  }

  fn min(a: f32, b: f32) -> f32 {
    a.min(b)
  }

  fn max(a: f32, b: f32) -> f32 {
    a.max(b)
  }

  fn encode_value(value: f32, out: &mut [u8]) {
    out.copy_from_slice(&value.to_le_bytes());
  }

  fn decode_value(bytes: &[u8]) -> f32 {
    decode_f32(bytes)
  }

  fn encode_header(header: &ValueRange, out: &mut [u8]) {
    encode_range(header, out);
  }

  fn decode_header(bytes: &[u8]) -> ValueRange {
    decode_range(bytes)
  }

  fn compute_header(payload: &[f32], nodata: f32) -> ValueRange {
    scalar_range(payload, nodata)
  }

  fn to_components(value: f32) -> Vec<f64> {
    vec![value as f64]
  }

  fn from_components(components: &[f64]) -> Option<f32> {
    match components {
      [v] => Some(*v as f32),
      _ => None,
    }
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
