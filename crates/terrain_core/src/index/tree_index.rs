//! TreeIndex - packed 64-bit address of a node in the quadtree forest.

use std::fmt;

use crate::error::{Result, TerrainError};

const PATCH_BITS: u32 = 8;
const CHILD_BITS: u32 = 2;
const LEVEL_BITS: u32 = 6;
const PATH_BITS: u32 = 48;

const CHILD_SHIFT: u32 = PATCH_BITS;
const LEVEL_SHIFT: u32 = CHILD_SHIFT + CHILD_BITS;
const PATH_SHIFT: u32 = LEVEL_SHIFT + LEVEL_BITS;

const PATCH_MASK: u64 = (1 << PATCH_BITS) - 1;
const CHILD_MASK: u64 = (1 << CHILD_BITS) - 1;
const LEVEL_MASK: u64 = (1 << LEVEL_BITS) - 1;
const PATH_MASK: u64 = (1 << PATH_BITS) - 1;

/// Deepest representable level (two path bits per level).
pub const MAX_LEVEL: u8 = (PATH_BITS / 2) as u8;

/// Packed quadtree address.
///
/// Layout (LSB first): `patch:8 | child:2 | level:6 | path:48`.
/// Equality and hashing operate on the packed word, so [`TreeIndex::INVALID`]
/// compares and hashes consistently like any other key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeIndex(u64);

impl TreeIndex {
  /// Sentinel for "unassigned". Decodes to a level beyond [`MAX_LEVEL`].
  pub const INVALID: Self = Self(u64::MAX);

  /// Build an index from its fields. Path bits above `2 * level` are
  /// discarded.
  pub fn new(patch: u8, child: u8, level: u8, path: u64) -> Self {
    debug_assert!(child < 4, "child selector out of range");
    debug_assert!(level <= MAX_LEVEL, "level beyond MAX_LEVEL");
    let path = path & level_mask(level);
    Self(
      (patch as u64 & PATCH_MASK)
        | ((child as u64 & CHILD_MASK) << CHILD_SHIFT)
        | ((level as u64 & LEVEL_MASK) << LEVEL_SHIFT)
        | ((path & PATH_MASK) << PATH_SHIFT),
    )
  }

  /// Root node of a patch.
  #[inline]
  pub fn root(patch: u8) -> Self {
    Self::new(patch, 0, 0, 0)
  }

  /// Raw packed word.
  #[inline]
  pub fn raw(self) -> u64 {
    self.0
  }

  /// Rebuild from a packed word produced by [`raw`](Self::raw).
  #[inline]
  pub fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  #[inline]
  pub fn patch(self) -> u8 {
    (self.0 & PATCH_MASK) as u8
  }

  /// Selector of this node among its siblings (0 for roots).
  #[inline]
  pub fn child(self) -> u8 {
    ((self.0 >> CHILD_SHIFT) & CHILD_MASK) as u8
  }

  #[inline]
  pub fn level(self) -> u8 {
    ((self.0 >> LEVEL_SHIFT) & LEVEL_MASK) as u8
  }

  #[inline]
  pub fn path(self) -> u64 {
    (self.0 >> PATH_SHIFT) & PATH_MASK
  }

  #[inline]
  pub fn is_valid(self) -> bool {
    self != Self::INVALID && self.level() <= MAX_LEVEL
  }

  #[inline]
  pub fn is_root(self) -> bool {
    self.is_valid() && self.level() == 0
  }

  /// Child selector taken at `depth` (0 = the root's immediate child).
  #[inline]
  pub fn digit(self, depth: u8) -> u8 {
    ((self.path() >> (2 * depth as u32)) & 3) as u8
  }

  /// Child selectors from the root down to this node.
  pub fn digits(self) -> impl Iterator<Item = u8> {
    (0..self.level()).map(move |depth| self.digit(depth))
  }

  /// Index of child `which` (0-3), one level deeper.
  pub fn down(self, which: u8) -> Result<Self> {
    if !self.is_valid() {
      return Err(TerrainError::InvalidIndex("down() on an invalid index".into()));
    }
    if which > 3 {
      return Err(TerrainError::InvalidIndex(format!(
        "child selector {which} out of range 0..=3"
      )));
    }
    let level = self.level();
    if level >= MAX_LEVEL {
      return Err(TerrainError::InvalidIndex(format!(
        "{self} is already at MAX_LEVEL"
      )));
    }
    let path = self.path() | ((which as u64) << (2 * level as u32));
    Ok(Self::new(self.patch(), which, level + 1, path))
  }

  /// Index of the parent node.
  pub fn up(self) -> Result<Self> {
    if !self.is_valid() {
      return Err(TerrainError::InvalidIndex("up() on an invalid index".into()));
    }
    let level = self.level();
    if level == 0 {
      return Err(TerrainError::InvalidIndex(format!("up() on root {self}")));
    }
    let level = level - 1;
    let path = self.path() & level_mask(level);
    let child = if level == 0 {
      0
    } else {
      ((path >> (2 * (level as u32 - 1))) & 3) as u8
    };
    Ok(Self::new(self.patch(), child, level, path))
  }

  /// All four children, in selector order.
  pub fn children(self) -> Result<[Self; 4]> {
    Ok([self.down(0)?, self.down(1)?, self.down(2)?, self.down(3)?])
  }

  /// True if `other` lies in the subtree rooted at `self` (inclusive).
  pub fn is_ancestor_of(self, other: Self) -> bool {
    self.is_valid()
      && other.is_valid()
      && self.patch() == other.patch()
      && self.level() <= other.level()
      && (other.path() & level_mask(self.level())) == self.path()
  }
}

#[inline]
fn level_mask(level: u8) -> u64 {
  if level >= MAX_LEVEL {
    PATH_MASK
  } else {
    (1u64 << (2 * level as u32)) - 1
  }
}

impl Default for TreeIndex {
  fn default() -> Self {
    Self::INVALID
  }
}

impl fmt::Display for TreeIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !self.is_valid() {
      return write!(f, "<invalid>");
    }
    write!(f, "p{}/{}:", self.patch(), self.level())?;
    if self.level() == 0 {
      return write!(f, "-");
    }
    for digit in self.digits() {
      write!(f, "{digit}")?;
    }
    Ok(())
  }
}

impl fmt::Debug for TreeIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TreeIndex({self})")
  }
}

#[cfg(test)]
#[path = "tree_index_test.rs"]
mod tree_index_test;
