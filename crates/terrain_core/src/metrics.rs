//! Engine-agnostic fetch and traversal metrics.
//!
//! Collection is gated twice: the `metrics` feature compiles it in, and
//! [`COLLECT_METRICS`] switches it at runtime. With the feature off every
//! `record_*` call is a no-op.

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicBool, Ordering};

/// Runtime switch for metrics collection.
#[cfg(feature = "metrics")]
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Enable or disable metrics collection at runtime.
#[cfg(feature = "metrics")]
pub fn set_enabled(enabled: bool) {
  COLLECT_METRICS.store(enabled, Ordering::Relaxed);
}

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Fixed-size history of recent samples.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a value, evicting the oldest at capacity.
  pub fn push(&mut self, value: T) {
    if self.capacity == 0 {
      return;
    }
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Oldest to newest.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn sum(&self) -> u64 {
    self.buffer.iter().sum()
  }

  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = self.buffer.iter().min()?;
    let max = self.buffer.iter().max()?;
    Some((*min, *max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128) // ~2 seconds at 60fps
  }
}

/// Counters for the request drain, cumulative since creation or [`reset`].
///
/// [`reset`]: FetchMetrics::reset
#[derive(Debug, Clone, Default)]
pub struct FetchMetrics {
  /// Requests already satisfied by the cache.
  pub hits: u64,
  /// Synchronous fills plus spliced worker results.
  pub loads: u64,
  pub dispatches: u64,
  /// Channel lookups skipped because no buffer could be grabbed.
  pub exhaustions: u64,
  /// Channel lookups skipped because the channel's workers were full.
  pub busy: u64,
  /// Requests left undrained when the budget ran out.
  pub dropped: u64,
  pub errors: u64,
  /// Wall-clock time of each drain, in microseconds.
  pub drain_timings: RollingWindow<u64>,
  /// Average worker fill time per frame, in microseconds.
  pub fill_timings: RollingWindow<u64>,
}

impl FetchMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  /// Fold one drain into the counters.
  pub fn record_drain(&mut self, report: &crate::fetch::DrainReport) {
    if !is_enabled() {
      return;
    }
    self.hits += report.present as u64;
    self.loads += (report.loaded + report.collected) as u64;
    self.dispatches += report.dispatched as u64;
    self.exhaustions += report.exhausted as u64;
    self.busy += report.busy as u64;
    self.dropped += report.dropped as u64;
    self.errors += report.errors.len() as u64;
    self.drain_timings.push(report.elapsed.as_micros() as u64);
    if report.collected > 0 {
      self.fill_timings.push(report.fill_us / report.collected as u64);
    }
  }

  /// Share of serviced channel lookups that hit the cache.
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.loads + self.dispatches + self.exhaustions;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }

  pub fn avg_drain_us(&self) -> f64 {
    self.drain_timings.average()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window() {
    let mut window = RollingWindow::new(3);
    assert!(window.is_empty());

    window.push(10u64);
    window.push(20);
    window.push(30);
    assert_eq!(window.sum(), 60);
    assert_eq!(window.average(), 20.0);

    // Oldest is evicted.
    window.push(40);
    assert_eq!(window.len(), 3);
    assert_eq!(window.sum(), 90);
    assert_eq!(window.min_max(), Some((20, 40)));
    assert_eq!(window.last(), Some(&40));
  }

  #[test]
  fn test_zero_capacity_window_stays_empty() {
    let mut window = RollingWindow::new(0);
    window.push(1u64);
    assert!(window.is_empty());
    assert_eq!(window.min_max(), None);
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn test_record_drain() {
    use crate::fetch::DrainReport;

    let mut metrics = FetchMetrics::new();
    let report = DrainReport {
      present: 3,
      loaded: 1,
      dispatched: 0,
      exhausted: 0,
      ..DrainReport::default()
    };
    metrics.record_drain(&report);
    assert_eq!(metrics.hits, 3);
    assert_eq!(metrics.loads, 1);
    assert_eq!(metrics.hit_rate(), 0.75);
    assert_eq!(metrics.drain_timings.len(), 1);
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn test_busy_channels_not_counted_as_dropped_requests() {
    use crate::fetch::DrainReport;

    let mut metrics = FetchMetrics::new();
    // One request left over; the serviced one found both channels saturated.
    let report = DrainReport {
      requests: 2,
      processed: 1,
      dropped: 1,
      busy: 2,
      ..DrainReport::default()
    };
    metrics.record_drain(&report);
    assert_eq!(metrics.dropped, 1);
    assert_eq!(metrics.busy, 2);
    assert_eq!(metrics.exhaustions, 0);
  }
}
