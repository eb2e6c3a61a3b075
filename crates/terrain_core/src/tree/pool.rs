//! NodePool - arena of tree nodes handed out in sibling blocks of four.
//!
//! Roots are single slots allocated once. Every other node lives in a block
//! of four contiguous slots created by one split and freed by one merge, so
//! a parent can only ever see zero or four children.

use std::fmt;

/// Handle of a node slot in a [`NodePool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }

  /// Sibling `which` of a block whose first slot is `self`.
  #[inline]
  pub fn offset(self, which: u8) -> Self {
    debug_assert!(which < 4);
    Self(self.0 + which as u32)
  }
}

impl fmt::Debug for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "NodeId({})", self.0)
  }
}

/// Arena of nodes with block-of-four allocation.
pub struct NodePool<N> {
  slots: Vec<Option<N>>,
  /// First slots of freed blocks.
  free_blocks: Vec<NodeId>,
  live: usize,
}

impl<N> Default for NodePool<N> {
  fn default() -> Self {
    Self::new()
  }
}

impl<N> NodePool<N> {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free_blocks: Vec::new(),
      live: 0,
    }
  }

  /// Allocate a single, never freed slot.
  pub fn alloc_root(&mut self, node: N) -> NodeId {
    let id = NodeId(self.slots.len() as u32);
    self.slots.push(Some(node));
    self.live += 1;
    id
  }

  /// Allocate four contiguous siblings, reusing a freed block if possible.
  /// Returns the first slot.
  pub fn alloc_block(&mut self, nodes: [N; 4]) -> NodeId {
    let first = match self.free_blocks.pop() {
      Some(first) => first,
      None => {
        let first = NodeId(self.slots.len() as u32);
        self.slots.extend([None, None, None, None]);
        first
      }
    };
    for (which, node) in nodes.into_iter().enumerate() {
      self.slots[first.index() + which] = Some(node);
    }
    self.live += 4;
    first
  }

  /// Free the block starting at `first`, returning its nodes.
  ///
  /// Returns `None` (and frees nothing) if any slot of the block is vacant.
  pub fn free_block(&mut self, first: NodeId) -> Option<[N; 4]> {
    let range = first.index()..first.index() + 4;
    let block = self.slots.get_mut(range)?;
    if block.iter().any(Option::is_none) {
      return None;
    }
    let [a, b, c, d] = block else {
      return None;
    };
    let nodes = [a.take()?, b.take()?, c.take()?, d.take()?];
    self.free_blocks.push(first);
    self.live -= 4;
    Some(nodes)
  }

  #[inline]
  pub fn get(&self, id: NodeId) -> Option<&N> {
    self.slots.get(id.index()).and_then(Option::as_ref)
  }

  #[inline]
  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut N> {
    self.slots.get_mut(id.index()).and_then(Option::as_mut)
  }

  /// Occupied slots.
  pub fn live(&self) -> usize {
    self.live
  }

  /// Slots ever allocated, occupied or not.
  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  /// Freed blocks waiting for reuse.
  pub fn free_blocks(&self) -> usize {
    self.free_blocks.len()
  }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
