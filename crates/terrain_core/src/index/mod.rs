//! Global quadtree addressing.
//!
//! A [`TreeIndex`] names one node of the quadtree forest: which root patch it
//! descends from, how deep it is and the path of child selectors that leads
//! there. It is a plain value type and doubles as the cache key.
//!
//! # Path Convention
//!
//! ```text
//! path bits:  ... d3 d2 d1 d0
//!                          └── selector of the root's immediate child (level 1)
//! ```
//!
//! One base-4 digit per level, least-significant digit first.

pub mod tree_index;

pub use tree_index::{TreeIndex, MAX_LEVEL};
