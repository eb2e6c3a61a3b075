//! terrain_core - Out-of-core quadtree terrain data engine
//!
//! Streams elevation, color and auxiliary layer tiles of a planet (or a flat
//! patch) from tiled files into fixed-size caches, and keeps a
//! view-dependent quadtree refined over whatever data is resident.
//!
//! # Layers
//!
//! - **index**: [`TreeIndex`] addressing of quadtree nodes
//! - **tile_file**: binary tile records with child pointers, pyramid builder
//! - **cache**: frame-aware LRU [`CacheUnit`] with pinning
//! - **tree**: [`QuadTerrain`] split/merge over an arena of 4-node blocks
//! - **fetch**: request merge and the time-budgeted [`DataManager`] drain
//!
//! # Example
//!
//! ```ignore
//! use terrain_core::{TerrainConfig, TerrainSession, ViewerLod};
//!
//! let config = TerrainConfig::load("terrain.toml")?;
//! let mut session = TerrainSession::open(&config)?;
//! let viewer = ViewerLod::new(eye, 2.0);
//! loop {
//!   session.update(&viewer);
//!   for leaf in session.leaves() {
//!     let dem = session.data().dem().data(leaf.data[0].unwrap());
//!     // draw dem.payload over leaf.scope ...
//!   }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod index;
pub mod metrics;
pub mod session;
pub mod tile_file;
pub mod tree;
pub mod types;

pub use cache::{BufferId, CacheUnit, EvictionPolicy};
pub use config::TerrainConfig;
pub use constants::{Frame, TileIndex, NO_TILE};
pub use error::{CacheExhausted, Result, TerrainError};
pub use fetch::{DataManager, DrainReport, ProceduralSource, Request, TileData, TileFileSource, TileSource};
pub use index::TreeIndex;
pub use session::{FrameReport, TerrainSession};
pub use tile_file::{build_pyramid, TileDataset, TileFile};
pub use tree::{LodEvaluator, NodeData, Polyhedron, QuadScope, QuadTerrain, Scope, TreeConfig, ViewerLod};
pub use types::{Color, Height, Layer, PixelKind};
