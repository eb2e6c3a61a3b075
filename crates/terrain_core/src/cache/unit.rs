//! CacheUnit - keyed, frame-aware LRU over a fixed buffer pool.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::constants::Frame;
use crate::error::CacheExhausted;

/// Handle of one buffer in a [`CacheUnit`]. Stable for the unit's lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u32);

impl BufferId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Debug for BufferId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "BufferId({})", self.0)
  }
}

/// Which recently used buffers `grab` must leave alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
  /// Buffers touched in the current frame are never grabbed.
  #[default]
  ProtectCurrent,
  /// Buffers touched in the current or the previous frame are never grabbed.
  ProtectCurrentAndPrevious,
}

impl EvictionPolicy {
  /// True if a buffer stamped `stamp` may be grabbed during `frame`.
  #[inline]
  fn allows(self, stamp: Frame, frame: Frame) -> bool {
    match self {
      Self::ProtectCurrent => stamp < frame,
      Self::ProtectCurrentAndPrevious => stamp.saturating_add(1) < frame,
    }
  }
}

#[derive(Clone, Debug)]
struct Slot<K> {
  key: Option<K>,
  /// Frame of the last touch; `None` until first touched.
  stamp: Option<Frame>,
  valid: bool,
  pinned: u32,
  grabbed: bool,
  /// Use order within a frame.
  tick: u64,
}

impl<K> Slot<K> {
  fn free() -> Self {
    Self {
      key: None,
      stamp: None,
      valid: false,
      pinned: 0,
      grabbed: false,
      tick: 0,
    }
  }
}

/// Keyed LRU cache over a fixed pool of buffers of type `B`.
///
/// Buffer states:
///
/// ```text
///   free ──grab──▶ grabbed ──release(key)──▶ keyed, invalid
///                                              │ touch
///                                              ▼
///        grab (LRU, unpinned, old) ◀── keyed, valid ◀──▶ pinned
/// ```
pub struct CacheUnit<K, B> {
  slots: Vec<Slot<K>>,
  buffers: Vec<B>,
  lookup: HashMap<K, BufferId>,
  /// Every buffer, least recently used first. Rebuilt lazily.
  lru: Vec<BufferId>,
  lru_dirty: bool,
  tick: u64,
  policy: EvictionPolicy,
}

impl<K, B> CacheUnit<K, B>
where
  K: Copy + Eq + Hash + fmt::Debug,
{
  /// Pool of `capacity` buffers built by `make`.
  pub fn new(capacity: usize, policy: EvictionPolicy, make: impl FnMut() -> B) -> Self {
    Self::with_buffers(std::iter::repeat_with(make).take(capacity).collect(), policy)
  }

  /// Pool over caller-provided buffers.
  pub fn with_buffers(buffers: Vec<B>, policy: EvictionPolicy) -> Self {
    let capacity = buffers.len();
    assert!(capacity <= u32::MAX as usize, "cache capacity exceeds u32");
    Self {
      slots: (0..capacity).map(|_| Slot::free()).collect(),
      buffers,
      lookup: HashMap::with_capacity(capacity),
      lru: (0..capacity as u32).map(BufferId).collect(),
      lru_dirty: false,
      tick: 0,
      policy,
    }
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.buffers.len()
  }

  /// Number of keyed buffers.
  #[inline]
  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.lookup.is_empty()
  }

  pub fn policy(&self) -> EvictionPolicy {
    self.policy
  }

  pub fn set_policy(&mut self, policy: EvictionPolicy) {
    self.policy = policy;
  }

  // ===========================================================================
  // Lookup
  // ===========================================================================

  /// Buffer currently keyed by `key`. No state change.
  #[inline]
  pub fn find(&self, key: &K) -> Option<BufferId> {
    self.lookup.get(key).copied()
  }

  pub fn key_of(&self, id: BufferId) -> Option<K> {
    self.slots[id.index()].key
  }

  pub fn is_valid(&self, id: BufferId) -> bool {
    self.slots[id.index()].valid
  }

  pub fn is_pinned(&self, id: BufferId) -> bool {
    self.slots[id.index()].pinned > 0
  }

  /// Frame of the last touch, `None` if never touched.
  pub fn frame_stamp(&self, id: BufferId) -> Option<Frame> {
    self.slots[id.index()].stamp
  }

  #[inline]
  pub fn buffer(&self, id: BufferId) -> &B {
    &self.buffers[id.index()]
  }

  #[inline]
  pub fn buffer_mut(&mut self, id: BufferId) -> &mut B {
    &mut self.buffers[id.index()]
  }

  // ===========================================================================
  // Eviction
  // ===========================================================================

  /// Take the least recently used evictable buffer.
  ///
  /// Evictable means unpinned, not already grabbed, stamped before the
  /// policy's protected frames and, if given, before `older_than`. The buffer
  /// leaves the lookup and becomes invalid until [`release`](Self::release).
  pub fn grab(&mut self, frame: Frame, older_than: Option<Frame>) -> Result<BufferId, CacheExhausted> {
    self.rebuild_lru();
    let policy = self.policy;
    let found = self.lru.iter().copied().find(|id| {
      let slot = &self.slots[id.index()];
      slot.pinned == 0
        && !slot.grabbed
        && match slot.stamp {
          None => true,
          Some(stamp) => policy.allows(stamp, frame) && older_than.map_or(true, |limit| stamp < limit),
        }
    });
    let Some(id) = found else {
      return Err(CacheExhausted {
        capacity: self.capacity(),
      });
    };

    let slot = &mut self.slots[id.index()];
    if let Some(key) = slot.key.take() {
      self.lookup.remove(&key);
    }
    slot.valid = false;
    slot.grabbed = true;
    Ok(id)
  }

  /// Key a grabbed buffer. A stale buffer already keyed by `key` is unkeyed.
  pub fn release(&mut self, key: K, id: BufferId) {
    debug_assert!(self.slots[id.index()].grabbed, "release of ungrabbed {id:?}");
    if let Some(old) = self.lookup.insert(key, id) {
      if old != id {
        let stale = &mut self.slots[old.index()];
        stale.key = None;
        stale.valid = false;
      }
    }

    self.tick += 1;
    let slot = &mut self.slots[id.index()];
    if let Some(previous) = slot.key.replace(key) {
      if previous != key {
        self.lookup.remove(&previous);
      }
    }
    slot.grabbed = false;
    slot.tick = self.tick;
    self.lru_dirty = true;
  }

  /// Mark a buffer used in `frame` and, if keyed, its content valid.
  ///
  /// Idempotent within a frame.
  pub fn touch(&mut self, id: BufferId, frame: Frame) {
    let slot = &mut self.slots[id.index()];
    if slot.valid && slot.stamp == Some(frame) {
      return;
    }
    self.tick += 1;
    slot.stamp = Some(frame);
    slot.valid = slot.key.is_some();
    slot.tick = self.tick;
    self.lru_dirty = true;
  }

  pub fn pin(&mut self, id: BufferId) {
    self.slots[id.index()].pinned += 1;
  }

  pub fn unpin(&mut self, id: BufferId) {
    let slot = &mut self.slots[id.index()];
    debug_assert!(slot.pinned > 0, "unpin of unpinned {id:?}");
    slot.pinned = slot.pinned.saturating_sub(1);
  }

  /// Back-date the `n` most recently used buffers by `age` frames.
  pub fn age_mru(&mut self, n: usize, age: Frame) {
    self.rebuild_lru();
    for id in self.lru.iter().rev().take(n) {
      let slot = &mut self.slots[id.index()];
      if let Some(stamp) = slot.stamp.as_mut() {
        *stamp = stamp.saturating_sub(age);
      }
    }
    self.lru_dirty = true;
  }

  /// Drop `key` from the cache. Pinned buffers stay; returns whether the
  /// key was removed.
  pub fn invalidate(&mut self, key: &K) -> bool {
    let Some(id) = self.find(key) else {
      return false;
    };
    let slot = &mut self.slots[id.index()];
    if slot.pinned > 0 {
      return false;
    }
    slot.key = None;
    slot.valid = false;
    self.lookup.remove(key);
    true
  }

  fn rebuild_lru(&mut self) {
    if !self.lru_dirty {
      return;
    }
    let slots = &self.slots;
    self
      .lru
      .sort_by_key(|id| (slots[id.index()].stamp, slots[id.index()].tick));
    self.lru_dirty = false;
  }

  /// Verify that the lookup, the slots and the LRU view agree.
  pub fn check_invariants(&self) -> Result<(), String> {
    for (key, id) in &self.lookup {
      let slot = self
        .slots
        .get(id.index())
        .ok_or_else(|| format!("{key:?} maps to missing {id:?}"))?;
      if slot.key.as_ref() != Some(key) {
        return Err(format!("{key:?} maps to {id:?} keyed {:?}", slot.key));
      }
      if slot.grabbed {
        return Err(format!("{key:?} maps to grabbed {id:?}"));
      }
    }
    for (index, slot) in self.slots.iter().enumerate() {
      if let Some(key) = &slot.key {
        if self.lookup.get(key) != Some(&BufferId(index as u32)) {
          return Err(format!("{:?} keyed {key:?} missing from lookup", BufferId(index as u32)));
        }
      }
      if slot.valid && slot.key.is_none() {
        return Err(format!("{:?} valid without a key", BufferId(index as u32)));
      }
    }
    let mut seen = vec![false; self.slots.len()];
    for id in &self.lru {
      let entry = seen
        .get_mut(id.index())
        .ok_or_else(|| format!("LRU holds unknown {id:?}"))?;
      if std::mem::replace(entry, true) {
        return Err(format!("LRU holds {id:?} twice"));
      }
    }
    if seen.iter().any(|s| !s) {
      return Err("LRU view is missing buffers".into());
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "unit_test.rs"]
mod unit_test;
