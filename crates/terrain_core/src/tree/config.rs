//! Split/merge thresholds and per-frame rate limits.

use serde::{Deserialize, Serialize};

use crate::index::MAX_LEVEL;

/// LOD thresholds with hysteresis and per-frame budgets.
///
/// A leaf splits when its LOD estimate rises above `split_above`; a split
/// node merges when it falls below `merge_below`. Keeping
/// `merge_below < split_above` prevents nodes flickering between the two.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
  pub split_above: f64,
  pub merge_below: f64,
  /// Deepest level a node may reach.
  pub max_level: u8,
  /// Maximum splits per frame (0 = unlimited).
  pub max_splits_per_frame: usize,
  /// Maximum LOD-driven merges per frame (0 = unlimited).
  pub max_merges_per_frame: usize,
}

impl TreeConfig {
  pub const DEFAULT: Self = Self {
    split_above: 0.0,
    merge_below: -0.5,
    max_level: MAX_LEVEL,
    max_splits_per_frame: 32,
    max_merges_per_frame: 32,
  };

  /// No rate limits, for tests and offline traversal.
  pub const UNLIMITED: Self = Self {
    max_splits_per_frame: 0,
    max_merges_per_frame: 0,
    ..Self::DEFAULT
  };

  #[inline]
  pub fn can_split(&self, performed: usize) -> bool {
    self.max_splits_per_frame == 0 || performed < self.max_splits_per_frame
  }

  #[inline]
  pub fn can_merge(&self, performed: usize) -> bool {
    self.max_merges_per_frame == 0 || performed < self.max_merges_per_frame
  }
}

impl Default for TreeConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Counters from one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
  pub visited: usize,
  pub splits: usize,
  /// Merges of split nodes, LOD-driven or because they left the view.
  pub merges: usize,
  /// Splits postponed because child data is not cached yet.
  pub deferred_splits: usize,
  pub requests: usize,
  pub leaves: usize,
}
