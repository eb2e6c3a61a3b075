//! One data channel: a buffer cache, its source and optional workers.

use std::sync::Arc;

use tracing::{trace, warn};
use web_time::Instant;

use super::request::{Request, TileHint};
use super::source::{FetchTarget, TileData, TileSource};
use super::worker::{FetchDone, FetchJob, FetchWorker};
use crate::cache::{BufferId, CacheUnit, EvictionPolicy};
use crate::constants::Frame;
use crate::error::{Result, TerrainError};
use crate::index::TreeIndex;
use crate::tree::Scope;
use crate::types::PixelKind;

/// What servicing one request did to one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
  /// Already cached and valid.
  Present,
  /// A worker is filling it.
  InFlight,
  /// Filled synchronously.
  Loaded,
  /// Handed to a worker.
  Dispatched,
  /// Workers are saturated; dropped for this frame.
  Busy,
  /// No buffer could be grabbed; dropped for this frame.
  Exhausted,
}

/// Results spliced back from the workers.
#[derive(Debug, Default)]
pub struct Collected {
  pub loaded: usize,
  pub errors: Vec<(TreeIndex, TerrainError)>,
  /// Summed queue and fill time of the spliced jobs.
  pub queue_us: u64,
  pub fill_us: u64,
}

/// Typed cache of one channel's tiles.
pub struct ChannelCache<P: PixelKind, S: Scope> {
  name: String,
  cache: CacheUnit<TreeIndex, TileData<P>>,
  source: Arc<dyn TileSource<P, S>>,
  worker: Option<FetchWorker<P, S>>,
}

impl<P: PixelKind, S: Scope> ChannelCache<P, S> {
  /// `capacity` buffers sized for `source`, filled on the caller's thread.
  pub fn new(
    name: impl Into<String>,
    capacity: usize,
    policy: EvictionPolicy,
    source: Arc<dyn TileSource<P, S>>,
  ) -> Self {
    let (pixels, nodata) = (source.tile_pixels(), source.nodata());
    Self {
      name: name.into(),
      cache: CacheUnit::new(capacity, policy, || TileData::new(pixels, nodata)),
      source,
      worker: None,
    }
  }

  /// Move fills onto `threads` background threads.
  pub fn with_workers(mut self, threads: usize, max_in_flight: usize) -> Result<Self> {
    self.worker = Some(FetchWorker::spawn(
      &self.name,
      Arc::clone(&self.source),
      threads,
      max_in_flight,
    )?);
    Ok(self)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn cache(&self) -> &CacheUnit<TreeIndex, TileData<P>> {
    &self.cache
  }

  pub fn cache_mut(&mut self) -> &mut CacheUnit<TreeIndex, TileData<P>> {
    &mut self.cache
  }

  pub fn source(&self) -> &Arc<dyn TileSource<P, S>> {
    &self.source
  }

  pub fn is_async(&self) -> bool {
    self.worker.is_some()
  }

  pub fn in_flight(&self) -> usize {
    self.worker.as_ref().map_or(0, FetchWorker::in_flight)
  }

  /// Content of a buffer handed out by the tree.
  pub fn data(&self, id: BufferId) -> &TileData<P> {
    self.cache.buffer(id)
  }

  /// Valid buffer for `index`, without touching it.
  pub fn lookup(&self, index: TreeIndex) -> Option<BufferId> {
    self.cache.find(&index).filter(|&id| self.cache.is_valid(id))
  }

  /// Valid buffer for `index`, touched in `frame`.
  pub fn refresh(&mut self, index: TreeIndex, held: Option<BufferId>, frame: Frame) -> Option<BufferId> {
    let id = match held {
      Some(id) if self.cache.key_of(id) == Some(index) && self.cache.is_valid(id) => id,
      _ => self.lookup(index)?,
    };
    self.cache.touch(id, frame);
    Some(id)
  }

  /// Hint for child `which` taken from the parent's child pointers.
  pub fn child_hint(&self, parent: Option<BufferId>, which: u8) -> TileHint {
    match parent {
      Some(id) if self.cache.is_valid(id) => {
        TileHint::from_pointer(self.cache.buffer(id).children[(which & 3) as usize])
      }
      _ => TileHint::Unknown,
    }
  }

  /// True if the cached content of `index` says data goes deeper.
  pub fn can_refine(&self, index: TreeIndex, buffer: Option<BufferId>) -> bool {
    buffer.is_some_and(|id| self.source.can_refine(index, self.cache.buffer(id)))
  }

  /// Make sure `index` is cached or on its way.
  pub fn service(&mut self, request: &Request<S>, channel: usize, frame: Frame) -> Result<Service> {
    let index = request.index;
    let reuse = match self.cache.find(&index) {
      Some(id) if self.cache.is_valid(id) => return Ok(Service::Present),
      Some(id) if self.cache.is_pinned(id) => return Ok(Service::InFlight),
      other => other,
    };
    if self.worker.as_ref().is_some_and(|w| !w.has_capacity()) {
      return Ok(Service::Busy);
    }

    let id = match reuse {
      // Keyed but invalid: a previous fill failed, refill in place.
      Some(id) => id,
      None => match self.cache.grab(frame, None) {
        Ok(id) => {
          self.cache.release(index, id);
          id
        }
        Err(exhausted) => {
          trace!(channel = %self.name, index = %index, %exhausted, "request dropped");
          return Ok(Service::Exhausted);
        }
      },
    };

    let target = FetchTarget {
      index,
      scope: request.scope.clone(),
      hint: request.hint(channel),
    };
    let (pixels, nodata) = (self.source.tile_pixels(), self.source.nodata());
    let data = self.cache.buffer_mut(id);
    if data.payload.len() != pixels {
      data.payload.resize(pixels, nodata);
    }

    let Some(worker) = self.worker.as_mut() else {
      self.source.fill(&target, data)?;
      self.cache.touch(id, frame);
      return Ok(Service::Loaded);
    };

    self.cache.pin(id);
    let job = FetchJob {
      id,
      target,
      data: std::mem::replace(self.cache.buffer_mut(id), TileData::empty()),
      enqueued_at: Instant::now(),
    };
    match worker.submit(job) {
      Ok(()) => Ok(Service::Dispatched),
      Err(job) => {
        *self.cache.buffer_mut(id) = job.data;
        self.cache.unpin(id);
        Err(TerrainError::Fetch(format!("{} workers stopped", self.name)))
      }
    }
  }

  /// Splice finished fills back into the cache.
  pub fn collect(&mut self, frame: Frame) -> Collected {
    let mut collected = Collected::default();
    let done = match self.worker.as_mut() {
      Some(worker) => worker.completed(),
      None => return collected,
    };
    for done in done {
      self.splice(done, frame, &mut collected);
    }
    collected
  }

  /// Block until every in-flight fill is back, then splice them.
  pub fn finish(&mut self, frame: Frame) -> Collected {
    let mut collected = self.collect(frame);
    while let Some(done) = self.worker.as_mut().and_then(FetchWorker::wait_one) {
      self.splice(done, frame, &mut collected);
    }
    collected
  }

  fn splice(&mut self, done: FetchDone<P>, frame: Frame, collected: &mut Collected) {
    *self.cache.buffer_mut(done.id) = done.data;
    self.cache.unpin(done.id);
    collected.queue_us += done.queue_us;
    collected.fill_us += done.fill_us;
    match done.result {
      // Pinned buffers keep their key, so the result is still for `index`.
      Ok(()) => {
        self.cache.touch(done.id, frame);
        collected.loaded += 1;
      }
      Err(err) => {
        warn!(channel = %self.name, index = %done.index, error = %err, "background fill failed");
        collected.errors.push((done.index, err));
      }
    }
  }

  /// Fill a buffer outside the cache, for use when the cache is exhausted.
  pub fn read_transient(&self, request: &Request<S>, channel: usize) -> Result<TileData<P>> {
    let mut data = TileData::new(self.source.tile_pixels(), self.source.nodata());
    let target = FetchTarget {
      index: request.index,
      scope: request.scope.clone(),
      hint: request.hint(channel),
    };
    self.source.fill(&target, &mut data)?;
    Ok(data)
  }
}

/// Channel operations that do not depend on the pixel kind, so a manager
/// can walk DEM, color and layer caches alike.
pub trait DataChannel<S: Scope> {
  fn name(&self) -> &str;
  fn lookup(&self, index: TreeIndex) -> Option<BufferId>;
  fn refresh(&mut self, index: TreeIndex, held: Option<BufferId>, frame: Frame) -> Option<BufferId>;
  fn child_hint(&self, parent: Option<BufferId>, which: u8) -> TileHint;
  fn service(&mut self, request: &Request<S>, channel: usize, frame: Frame) -> Result<Service>;
  fn collect(&mut self, frame: Frame) -> Collected;
  fn finish(&mut self, frame: Frame) -> Collected;
  fn in_flight(&self) -> usize;
  fn check_invariants(&self) -> std::result::Result<(), String>;
}

impl<P: PixelKind, S: Scope> DataChannel<S> for ChannelCache<P, S> {
  fn name(&self) -> &str {
    &self.name
  }

  fn lookup(&self, index: TreeIndex) -> Option<BufferId> {
    ChannelCache::lookup(self, index)
  }

  fn refresh(&mut self, index: TreeIndex, held: Option<BufferId>, frame: Frame) -> Option<BufferId> {
    ChannelCache::refresh(self, index, held, frame)
  }

  fn child_hint(&self, parent: Option<BufferId>, which: u8) -> TileHint {
    ChannelCache::child_hint(self, parent, which)
  }

  fn service(&mut self, request: &Request<S>, channel: usize, frame: Frame) -> Result<Service> {
    ChannelCache::service(self, request, channel, frame)
  }

  fn collect(&mut self, frame: Frame) -> Collected {
    ChannelCache::collect(self, frame)
  }

  fn finish(&mut self, frame: Frame) -> Collected {
    ChannelCache::finish(self, frame)
  }

  fn in_flight(&self) -> usize {
    ChannelCache::in_flight(self)
  }

  fn check_invariants(&self) -> std::result::Result<(), String> {
    self.cache.check_invariants()
  }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;
