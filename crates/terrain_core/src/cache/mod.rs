//! Frame-aware LRU caching of tile buffers.
//!
//! A [`CacheUnit`] owns a fixed pool of buffers. Tree nodes hold
//! [`BufferId`] handles and refresh them every frame with
//! [`CacheUnit::touch`]; the fetch stage recycles the least recently used
//! buffers with [`CacheUnit::grab`] / [`CacheUnit::release`]. Memory use is
//! therefore fixed at construction.

pub mod unit;

pub use unit::{BufferId, CacheUnit, EvictionPolicy};
