//! Background fill threads for one channel.
//!
//! ```text
//!  owner thread                       worker threads
//!  ────────────                       ──────────────
//!  pin + move buffer ──jobs (bounded)──▶ source.fill(target, data)
//!  splice + unpin    ◀──done (bounded)── send result
//! ```
//!
//! Workers own nothing but the data moved to them; every cache operation
//! stays on the owner thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;
use web_time::Instant;

use super::source::{FetchTarget, TileData, TileSource};
use crate::cache::BufferId;
use crate::error::Result;
use crate::index::TreeIndex;
use crate::types::PixelKind;

/// Fill job: a buffer's data moved out of the cache for the duration.
pub struct FetchJob<P: PixelKind, S> {
  pub id: BufferId,
  pub target: FetchTarget<S>,
  pub data: TileData<P>,
  pub enqueued_at: Instant,
}

/// Finished job, returned to the owner for splicing.
pub struct FetchDone<P: PixelKind> {
  pub id: BufferId,
  pub index: TreeIndex,
  pub data: TileData<P>,
  pub result: Result<()>,
  pub queue_us: u64,
  pub fill_us: u64,
}

/// Fixed set of threads filling buffers from a shared source.
pub struct FetchWorker<P: PixelKind, S> {
  jobs: Option<Sender<FetchJob<P, S>>>,
  done: Receiver<FetchDone<P>>,
  handles: Vec<JoinHandle<()>>,
  in_flight: usize,
  max_in_flight: usize,
}

impl<P: PixelKind, S: Send + 'static> FetchWorker<P, S> {
  /// Start `threads` workers accepting at most `max_in_flight` jobs at once.
  pub fn spawn(
    name: &str,
    source: Arc<dyn TileSource<P, S>>,
    threads: usize,
    max_in_flight: usize,
  ) -> Result<Self> {
    let max_in_flight = max_in_flight.max(1);
    let (tx_job, rx_job) = bounded::<FetchJob<P, S>>(max_in_flight);
    let (tx_done, rx_done) = bounded::<FetchDone<P>>(max_in_flight);

    let mut handles = Vec::with_capacity(threads.max(1));
    for n in 0..threads.max(1) {
      let source = Arc::clone(&source);
      let rx_job = rx_job.clone();
      let tx_done = tx_done.clone();
      let handle = std::thread::Builder::new()
        .name(format!("{name}-fetch-{n}"))
        .spawn(move || {
          while let Ok(mut job) = rx_job.recv() {
            let started = Instant::now();
            let queue_us = (started - job.enqueued_at).as_micros() as u64;
            let result = source.fill(&job.target, &mut job.data);
            let done = FetchDone {
              id: job.id,
              index: job.target.index,
              data: job.data,
              result,
              queue_us,
              fill_us: started.elapsed().as_micros() as u64,
            };
            if tx_done.send(done).is_err() {
              break;
            }
          }
        })?;
      handles.push(handle);
    }
    debug!(channel = name, threads = handles.len(), max_in_flight, "started fetch workers");

    Ok(Self {
      jobs: Some(tx_job),
      done: rx_done,
      handles,
      in_flight: 0,
      max_in_flight,
    })
  }
}

impl<P: PixelKind, S> FetchWorker<P, S> {
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  pub fn has_capacity(&self) -> bool {
    self.in_flight < self.max_in_flight
  }

  pub fn threads(&self) -> usize {
    self.handles.len()
  }

  /// Queue a job. A full queue or stopped workers hand the job back.
  pub fn submit(&mut self, job: FetchJob<P, S>) -> std::result::Result<(), FetchJob<P, S>> {
    if !self.has_capacity() {
      return Err(job);
    }
    let Some(jobs) = &self.jobs else {
      return Err(job);
    };
    match jobs.try_send(job) {
      Ok(()) => {
        self.in_flight += 1;
        Ok(())
      }
      Err(TrySendError::Full(job) | TrySendError::Disconnected(job)) => Err(job),
    }
  }

  /// Finished jobs, without blocking.
  pub fn completed(&mut self) -> Vec<FetchDone<P>> {
    let done: Vec<_> = self.done.try_iter().collect();
    self.in_flight = self.in_flight.saturating_sub(done.len());
    done
  }

  /// Block until one job finishes. `None` if nothing is in flight.
  pub fn wait_one(&mut self) -> Option<FetchDone<P>> {
    if self.in_flight == 0 {
      return None;
    }
    let done = self.done.recv().ok()?;
    self.in_flight -= 1;
    Some(done)
  }
}

impl<P: PixelKind, S> Drop for FetchWorker<P, S> {
  fn drop(&mut self) {
    // Workers blocked on a full done queue must see it disconnect.
    self.jobs.take();
    drop(std::mem::replace(&mut self.done, crossbeam_channel::never()));
    for handle in self.handles.drain(..) {
      let _ = handle.join();
    }
  }
}
