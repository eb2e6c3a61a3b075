//! Shared constants for the tile format, cache and fetch stages.
//!
//! # Tile Record Layout
//!
//! ```text
//! ┌───────────────────────────── file ─────────────────────────────┐
//! │ FileHeader (fixed size for a pixel kind)                       │
//! ├────────────────────────── record 0 ────────────────────────────┤
//! │ children: [u32; 4] │ TileHeader │ payload: tile_w*tile_h pixels │
//! ├────────────────────────── record 1 ────────────────────────────┤
//! │ ...                                                            │
//! └────────────────────────────────────────────────────────────────┘
//!
//! record offset = tile_data_offset + index * record_size
//! ```

/// On-disk tile identifier, assigned sequentially on append.
pub type TileIndex = u32;

/// Sentinel tile index meaning "no tile".
pub const NO_TILE: TileIndex = TileIndex::MAX;

/// Frame counter passed explicitly to every cache call.
pub type Frame = u64;

/// Magic bytes at the start of every tile file.
pub const FILE_MAGIC: [u8; 4] = *b"QTRF";

/// Tile file format version.
pub const FILE_VERSION: u16 = 2;

/// Bytes used by the four child pointers at the start of every record.
pub const CHILD_POINTER_BYTES: usize = 4 * std::mem::size_of::<TileIndex>();

/// Default tile edge length in pixels (2^6 + 1, edges shared between
/// neighbours).
pub const DEFAULT_TILE_SIZE: u32 = 65;

/// Name of the key/value layout file stored next to the patch files.
pub const LAYOUT_FILE_NAME: &str = "layout.toml";

/// Per-frame wall-clock budget for the synchronous drain, in microseconds.
pub const DEFAULT_DRAIN_BUDGET_US: u64 = 100;

/// Priority given to requests for data a root node is missing.
pub const ROOT_REQUEST_PRIORITY: f64 = 1.0e9;

/// File name of the tile file holding one polyhedron patch.
pub fn patch_file_name(patch: u8) -> String {
  format!("patch_{patch:02}.qtf")
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
