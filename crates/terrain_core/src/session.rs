//! Per-viewer frame loop.
//!
//! A [`TerrainSession`] owns the frame counter, one tree and the channel
//! caches behind it. Nothing is global: two viewers are two sessions.
//!
//! ```text
//! update(eval)
//!   frame += 1
//!   tree.traverse(frame)     touch buffers, split/merge, emit requests
//!   data.process_frame(frame) collect, sort, drain within budget
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::TerrainConfig;
use crate::constants::Frame;
use crate::error::Result;
use crate::fetch::{ChannelCache, DataManager, DrainReport, TileFileSource, TileSource};
use crate::tile_file::{TileDataset, TileFileOptions};
use crate::tree::{Leaves, LodEvaluator, Polyhedron, QuadScope, QuadTerrain, Scope, TraversalStats, TreeConfig};
use crate::types::{Color, Height, Layer, PixelKind};

/// What one [`TerrainSession::update`] did.
#[derive(Debug)]
pub struct FrameReport {
  pub frame: Frame,
  pub traversal: TraversalStats,
  pub drain: DrainReport,
}

pub struct TerrainSession<S: Scope> {
  frame: Frame,
  tree: QuadTerrain<S>,
  data: DataManager<S>,
}

impl<S: Scope> TerrainSession<S> {
  pub fn new(root_scopes: Vec<S>, config: TreeConfig, data: DataManager<S>) -> Self {
    Self {
      frame: 0,
      tree: QuadTerrain::new(root_scopes, data.channel_count(), config),
      data,
    }
  }

  /// Last frame passed to [`update`](Self::update), 0 before the first.
  pub fn frame(&self) -> Frame {
    self.frame
  }

  pub fn tree(&self) -> &QuadTerrain<S> {
    &self.tree
  }

  pub fn tree_mut(&mut self) -> &mut QuadTerrain<S> {
    &mut self.tree
  }

  pub fn data(&self) -> &DataManager<S> {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut DataManager<S> {
    &mut self.data
  }

  /// Visible leaves as of the last update.
  pub fn leaves(&self) -> Leaves<'_, S> {
    self.tree.leaves()
  }

  /// Advance one frame: traverse, then drain requests.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "session::update"))]
  pub fn update<E: LodEvaluator<S>>(&mut self, eval: &E) -> FrameReport {
    self.frame += 1;
    let traversal = self.tree.traverse(self.frame, eval, &mut self.data);
    let drain = self.data.process_frame(self.frame);
    FrameReport {
      frame: self.frame,
      traversal,
      drain,
    }
  }

  /// Wait for every background fill, e.g. before shutdown.
  pub fn finish(&mut self) -> DrainReport {
    self.data.finish(self.frame)
  }
}

impl TerrainSession<QuadScope> {
  /// Open the datasets named by `config` read-only and build a session over
  /// the polyhedron's root patches.
  pub fn open(config: &TerrainConfig) -> Result<Self> {
    config.validate()?;
    let polyhedron = config.data.polyhedron()?;

    let dem = open_channel::<Height>("dem", &config.data.dem, polyhedron, config, config.cache.dem_buffers)?;
    let mut data = DataManager::new(dem);
    if let Some(dir) = &config.data.color {
      data = data.with_color(open_channel::<Color>(
        "color",
        dir,
        polyhedron,
        config,
        config.cache.color_buffers,
      )?);
    }
    for dir in &config.data.layers {
      let name = dir
        .file_name()
        .map_or_else(|| "layer".to_string(), |n| n.to_string_lossy().into_owned());
      data = data.with_layer(open_channel::<Layer>(&name, dir, polyhedron, config, config.cache.layer_buffers)?);
    }
    data.set_budget(config.fetch.budget());

    debug!(
      polyhedron = polyhedron.name(),
      channels = data.channel_count(),
      workers = config.fetch.worker_threads,
      "opened terrain session"
    );
    Ok(Self::new(polyhedron.root_scopes(config.data.size), config.tree, data))
  }
}

fn open_channel<P: PixelKind>(
  name: &str,
  dir: &Path,
  polyhedron: Polyhedron,
  config: &TerrainConfig,
  capacity: usize,
) -> Result<ChannelCache<P, QuadScope>> {
  let mut options = TileFileOptions::<P>::new(config.data.tile_size, false);
  options.header_flush_interval = config.data.header_flush_interval;
  let dataset = TileDataset::open(dir, polyhedron, options)?;
  let source: Arc<dyn TileSource<P, QuadScope>> = Arc::new(TileFileSource::new(dataset));
  let cache = ChannelCache::new(name, capacity, config.cache.policy, source);
  if config.fetch.worker_threads > 0 {
    cache.with_workers(config.fetch.worker_threads, config.fetch.max_in_flight)
  } else {
    Ok(cache)
  }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
