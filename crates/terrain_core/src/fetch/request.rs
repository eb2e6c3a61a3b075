//! Data requests emitted by traversal and their per-frame merge.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::constants::{TileIndex, NO_TILE};
use crate::index::TreeIndex;

/// What the requester already knows about a channel's on-disk record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileHint {
  /// Locate by walking the file from the root.
  #[default]
  Unknown,
  /// The parent has no record for this child.
  Absent,
  /// Record index taken from the parent's child pointer.
  At(TileIndex),
}

impl TileHint {
  /// Hint from a parent's child pointer.
  pub fn from_pointer(tile: TileIndex) -> Self {
    if tile == NO_TILE {
      Self::Absent
    } else {
      Self::At(tile)
    }
  }
}

/// Per-channel hints. Inline for DEM, color and two layers.
pub type ChannelHints = SmallVec<[TileHint; 4]>;

/// Request for the data of one node.
#[derive(Clone, Debug)]
pub struct Request<S> {
  pub index: TreeIndex,
  pub scope: S,
  /// Larger is more urgent.
  pub priority: f64,
  /// One hint per channel; missing entries mean [`TileHint::Unknown`].
  pub hints: ChannelHints,
}

impl<S> Request<S> {
  pub fn new(index: TreeIndex, scope: S, priority: f64) -> Self {
    Self {
      index,
      scope,
      priority,
      hints: ChannelHints::new(),
    }
  }

  pub fn with_hints(mut self, hints: ChannelHints) -> Self {
    self.hints = hints;
    self
  }

  pub fn hint(&self, channel: usize) -> TileHint {
    self.hints.get(channel).copied().unwrap_or_default()
  }
}

/// Pending requests deduplicated by index, keeping the highest priority.
pub struct RequestSet<S> {
  slots: HashMap<TreeIndex, usize>,
  requests: Vec<Request<S>>,
}

impl<S> Default for RequestSet<S> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S> RequestSet<S> {
  pub fn new() -> Self {
    Self {
      slots: HashMap::new(),
      requests: Vec::new(),
    }
  }

  /// Add a request, merging with a pending one for the same index.
  ///
  /// The merged request keeps the higher priority and fills in hints the
  /// pending one lacked.
  pub fn insert(&mut self, request: Request<S>) {
    match self.slots.get(&request.index) {
      Some(&slot) => {
        let pending = &mut self.requests[slot];
        if request.priority > pending.priority {
          pending.priority = request.priority;
        }
        if pending.hints.len() < request.hints.len() {
          pending.hints.resize(request.hints.len(), TileHint::Unknown);
        }
        for (mine, theirs) in pending.hints.iter_mut().zip(&request.hints) {
          if *mine == TileHint::Unknown {
            *mine = *theirs;
          }
        }
      }
      None => {
        self.slots.insert(request.index, self.requests.len());
        self.requests.push(request);
      }
    }
  }

  pub fn len(&self) -> usize {
    self.requests.len()
  }

  pub fn is_empty(&self) -> bool {
    self.requests.is_empty()
  }

  pub fn get(&self, index: &TreeIndex) -> Option<&Request<S>> {
    self.slots.get(index).map(|&slot| &self.requests[slot])
  }

  /// Take every request, highest priority first. Ties keep insertion order.
  pub fn drain_sorted(&mut self) -> Vec<Request<S>> {
    self.slots.clear();
    let mut requests = std::mem::take(&mut self.requests);
    requests.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    requests
  }

  pub fn clear(&mut self) {
    self.slots.clear();
    self.requests.clear();
  }
}

impl<S> Extend<Request<S>> for RequestSet<S> {
  fn extend<I: IntoIterator<Item = Request<S>>>(&mut self, iter: I) {
    for request in iter {
      self.insert(request);
    }
  }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;
