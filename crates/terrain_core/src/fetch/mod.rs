//! Turning node requests into cached tile data.
//!
//! Traversal emits [`Request`]s; the [`DataManager`] merges them per frame
//! and services them in priority order within a wall-clock budget, either
//! filling buffers inline or handing them to a [`FetchWorker`].

pub mod channel;
pub mod manager;
pub mod request;
pub mod source;
pub mod worker;

pub use channel::{ChannelCache, Collected, DataChannel, Service};
pub use manager::{DataManager, DrainReport};
pub use request::{ChannelHints, Request, RequestSet, TileHint};
pub use source::{FetchTarget, ProceduralSource, TileData, TileFileSource, TileSource};
pub use worker::{FetchDone, FetchJob, FetchWorker};
