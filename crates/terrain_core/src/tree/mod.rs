//! Quadtree LOD lifecycle.
//!
//! A [`QuadTerrain`] keeps the part of the global quadtree forest a viewer
//! currently needs. Nodes live in a [`NodePool`] arena and hold cache handles
//! instead of tile data; traversal decides split vs. merge from a
//! [`LodEvaluator`] and emits data requests instead of blocking.
//!
//! # Node Lifecycle
//!
//! ```text
//!   root ──(lod high, children cached)──▶ split ──▶ 4 children (one block)
//!     ▲                                                  │
//!     └────────(lod low or invisible)─── merge ◀─────────┘
//! ```

pub mod config;
pub mod node;
pub mod polyhedron;
pub mod pool;
pub mod scope;
pub mod terrain;

pub use config::{TraversalStats, TreeConfig};
pub use node::{ChannelHandles, QuadNode};
pub use polyhedron::Polyhedron;
pub use pool::{NodeId, NodePool};
pub use scope::{LodEvaluator, QuadScope, Scope, ViewerLod};
pub use terrain::{LeafView, Leaves, NodeData, QuadTerrain};
