//! DataManager - per-viewer channel caches and the budgeted request drain.
//!
//! # Frame Flow
//!
//! ```text
//! tree.traverse ──request()──▶ RequestSet (dedupe, max priority)
//!                                   │ process_frame(frame)
//!                                   ▼
//!   collect worker results ─▶ sort by priority ─▶ drain until budget spent
//!                                                   grab / fill / release
//!                                                   or pin + dispatch
//!   leftovers are dropped; traversal asks again next frame
//! ```

use std::time::Duration;

use tracing::{debug, warn};
use web_time::Instant;

use super::channel::{ChannelCache, Collected, DataChannel, Service};
use super::request::{Request, RequestSet, TileHint};
use super::source::TileData;
use crate::cache::BufferId;
use crate::constants::{Frame, DEFAULT_DRAIN_BUDGET_US};
use crate::error::{Result, TerrainError};
use crate::index::TreeIndex;
use crate::metrics::FetchMetrics;
use crate::tree::{NodeData, Scope};
use crate::types::{Color, Height, Layer};

/// Outcome of one [`DataManager::process_frame`].
#[derive(Debug, Default)]
pub struct DrainReport {
  /// Distinct requests pending at the start of the drain.
  pub requests: usize,
  /// Requests serviced before the budget ran out.
  pub processed: usize,
  /// Requests left for a later frame.
  pub dropped: usize,
  /// Per-channel outcomes of the serviced requests.
  pub present: usize,
  pub loaded: usize,
  pub dispatched: usize,
  pub in_flight: usize,
  pub busy: usize,
  pub exhausted: usize,
  /// Worker results spliced in at the start of the drain.
  pub collected: usize,
  /// Summed worker fill time of the collected results, in microseconds.
  pub fill_us: u64,
  pub errors: Vec<(TreeIndex, TerrainError)>,
  pub elapsed: Duration,
}

impl DrainReport {
  fn absorb(&mut self, collected: Collected) {
    self.collected += collected.loaded;
    self.fill_us += collected.fill_us;
    self.errors.extend(collected.errors);
  }
}

/// Caches for the DEM, optional color and any number of auxiliary layers.
///
/// Channel 0 is the DEM; color, if present, is channel 1; layers follow.
pub struct DataManager<S: Scope> {
  dem: ChannelCache<Height, S>,
  color: Option<ChannelCache<Color, S>>,
  layers: Vec<ChannelCache<Layer, S>>,
  pending: RequestSet<S>,
  budget: Duration,
  metrics: FetchMetrics,
}

impl<S: Scope> DataManager<S> {
  pub fn new(dem: ChannelCache<Height, S>) -> Self {
    Self {
      dem,
      color: None,
      layers: Vec::new(),
      pending: RequestSet::new(),
      budget: Duration::from_micros(DEFAULT_DRAIN_BUDGET_US),
      metrics: FetchMetrics::new(),
    }
  }

  pub fn with_color(mut self, color: ChannelCache<Color, S>) -> Self {
    self.color = Some(color);
    self
  }

  pub fn with_layer(mut self, layer: ChannelCache<Layer, S>) -> Self {
    self.layers.push(layer);
    self
  }

  /// Wall-clock time one drain may spend servicing requests.
  pub fn set_budget(&mut self, budget: Duration) {
    self.budget = budget;
  }

  pub fn budget(&self) -> Duration {
    self.budget
  }

  pub fn dem(&self) -> &ChannelCache<Height, S> {
    &self.dem
  }

  pub fn color(&self) -> Option<&ChannelCache<Color, S>> {
    self.color.as_ref()
  }

  pub fn layers(&self) -> &[ChannelCache<Layer, S>] {
    &self.layers
  }

  pub fn metrics(&self) -> &FetchMetrics {
    &self.metrics
  }

  pub fn channel_count(&self) -> usize {
    1 + usize::from(self.color.is_some()) + self.layers.len()
  }

  pub fn channel(&self, channel: usize) -> Option<&dyn DataChannel<S>> {
    let color = usize::from(self.color.is_some());
    match channel {
      0 => Some(&self.dem),
      1 if color == 1 => self.color.as_ref().map(|c| c as &dyn DataChannel<S>),
      n => self.layers.get(n - 1 - color).map(|l| l as &dyn DataChannel<S>),
    }
  }

  pub fn channel_mut(&mut self, channel: usize) -> Option<&mut dyn DataChannel<S>> {
    let color = usize::from(self.color.is_some());
    match channel {
      0 => Some(&mut self.dem),
      1 if color == 1 => self.color.as_mut().map(|c| c as &mut dyn DataChannel<S>),
      n => self.layers.get_mut(n - 1 - color).map(|l| l as &mut dyn DataChannel<S>),
    }
  }

  /// Requests waiting for the next drain.
  pub fn pending(&self) -> &RequestSet<S> {
    &self.pending
  }

  /// Queue a request; duplicates merge, keeping the higher priority.
  pub fn submit(&mut self, request: Request<S>) {
    self.pending.insert(request);
  }

  /// Splice worker results, then service pending requests in priority order
  /// until the budget is spent. At least one request is serviced per call.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "fetch::process_frame"))]
  pub fn process_frame(&mut self, frame: Frame) -> DrainReport {
    let start = Instant::now();
    let mut report = DrainReport::default();
    let channels = self.channel_count();

    for channel in 0..channels {
      if let Some(cache) = self.channel_mut(channel) {
        report.absorb(cache.collect(frame));
      }
    }

    let requests = self.pending.drain_sorted();
    report.requests = requests.len();
    for request in &requests {
      if report.processed > 0 && start.elapsed() >= self.budget {
        break;
      }
      report.processed += 1;
      for channel in 0..channels {
        let Some(cache) = self.channel_mut(channel) else {
          continue;
        };
        match cache.service(request, channel, frame) {
          Ok(Service::Present) => report.present += 1,
          Ok(Service::InFlight) => report.in_flight += 1,
          Ok(Service::Loaded) => report.loaded += 1,
          Ok(Service::Dispatched) => report.dispatched += 1,
          Ok(Service::Busy) => report.busy += 1,
          Ok(Service::Exhausted) => report.exhausted += 1,
          Err(err) => {
            warn!(channel = cache.name(), index = %request.index, error = %err, "tile fill failed");
            report.errors.push((request.index, err));
          }
        }
      }
    }
    report.dropped = report.requests - report.processed;
    report.elapsed = start.elapsed();

    if report.requests > 0 || report.collected > 0 {
      debug!(
        frame,
        requests = report.requests,
        processed = report.processed,
        loaded = report.loaded,
        dispatched = report.dispatched,
        exhausted = report.exhausted,
        collected = report.collected,
        elapsed_us = report.elapsed.as_micros() as u64,
        "request drain"
      );
    }
    self.metrics.record_drain(&report);
    report
  }

  /// Wait for every in-flight fill and splice it, e.g. before shutdown.
  pub fn finish(&mut self, frame: Frame) -> DrainReport {
    let start = Instant::now();
    let mut report = DrainReport::default();
    for channel in 0..self.channel_count() {
      if let Some(cache) = self.channel_mut(channel) {
        report.absorb(cache.finish(frame));
      }
    }
    report.elapsed = start.elapsed();
    report
  }

  /// Fill DEM data for `request` into a one-shot buffer outside the cache.
  /// For callers that must have data even when the cache is exhausted.
  pub fn read_transient(&self, request: &Request<S>) -> Result<TileData<Height>> {
    self.dem.read_transient(request, 0)
  }

  /// Fills currently on worker threads, over all channels.
  pub fn in_flight(&self) -> usize {
    (0..self.channel_count())
      .filter_map(|channel| self.channel(channel))
      .map(|cache| cache.in_flight())
      .sum()
  }

  pub fn check_invariants(&self) -> std::result::Result<(), String> {
    for channel in 0..self.channel_count() {
      if let Some(cache) = self.channel(channel) {
        cache
          .check_invariants()
          .map_err(|err| format!("{}: {err}", cache.name()))?;
      }
    }
    Ok(())
  }
}

impl<S: Scope> NodeData<S> for DataManager<S> {
  fn channel_count(&self) -> usize {
    DataManager::channel_count(self)
  }

  fn refresh(&mut self, channel: usize, index: TreeIndex, held: Option<BufferId>, frame: Frame) -> Option<BufferId> {
    self.channel_mut(channel)?.refresh(index, held, frame)
  }

  fn lookup(&self, channel: usize, index: TreeIndex) -> Option<BufferId> {
    self.channel(channel)?.lookup(index)
  }

  fn child_hint(&self, channel: usize, parent: Option<BufferId>, which: u8) -> TileHint {
    self
      .channel(channel)
      .map_or(TileHint::Unknown, |cache| cache.child_hint(parent, which))
  }

  fn can_refine(&self, index: TreeIndex, primary: Option<BufferId>) -> bool {
    self.dem.can_refine(index, primary)
  }

  fn request(&mut self, request: Request<S>) {
    self.submit(request);
  }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
