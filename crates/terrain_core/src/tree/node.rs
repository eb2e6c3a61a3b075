//! QuadNode - one active node of a [`QuadTerrain`](super::QuadTerrain).

use smallvec::SmallVec;

use super::pool::NodeId;
use crate::cache::BufferId;
use crate::index::TreeIndex;

/// Per-channel cache handles. Inline for DEM, color and two layers.
pub type ChannelHandles = SmallVec<[Option<BufferId>; 4]>;

/// Active tree node.
#[derive(Clone, Debug)]
pub struct QuadNode<S> {
  pub index: TreeIndex,
  /// Back-reference; `None` for roots.
  pub parent: Option<NodeId>,
  /// First slot of the four-child block, if split.
  pub children: Option<NodeId>,
  pub scope: S,
  /// Cache handle per data channel; channel 0 is the primary (DEM) one.
  pub data: ChannelHandles,
  /// Last LOD estimate.
  pub lod: f64,
  /// Visibility at the last traversal.
  pub visible: bool,
}

impl<S> QuadNode<S> {
  pub fn new(index: TreeIndex, parent: Option<NodeId>, scope: S, channels: usize) -> Self {
    Self {
      index,
      parent,
      children: None,
      scope,
      data: SmallVec::from_elem(None, channels),
      lod: 0.0,
      visible: false,
    }
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  /// Handle of child `which`, if split.
  #[inline]
  pub fn child(&self, which: u8) -> Option<NodeId> {
    self.children.map(|first| first.offset(which))
  }

  /// True if every channel holds a buffer.
  pub fn has_all_data(&self) -> bool {
    self.data.iter().all(Option::is_some)
  }
}
