//! Binary tiled storage.
//!
//! One [`TileFile`] holds the tiles of one quadtree: fixed-size records with
//! four child pointers, a typed header and a pixel payload. A
//! [`TileDataset`] groups the files of every root patch with a text layout
//! file, and [`build_pyramid`] writes a full quadtree from leaf data.

pub mod dataset;
pub mod file;
pub mod header;
pub mod pyramid;

pub use dataset::{DatasetLayout, TileDataset};
pub use file::{TileFile, TileFileOptions, TileMeta};
pub use header::FileHeader;
pub use pyramid::{build_pyramid, downsample};
