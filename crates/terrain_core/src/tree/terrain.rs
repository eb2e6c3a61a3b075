//! QuadTerrain - view-dependent split/merge quadtree over a root forest.
//!
//! # Frame Loop
//!
//! ```text
//! traverse(frame)
//!   per node:   refresh channel buffers (touch) ─▶ missing? request self
//!               invisible ─▶ merge subtree
//!               split node: lod < merge_below ─▶ merge, else recurse
//!               leaf:       lod > split_above ─▶ children cached? split
//!                                                              : request children
//! ```
//!
//! Traversal never blocks on data: a split waits until every channel of all
//! four children is cached, and asks for the missing pieces meanwhile.

use tracing::trace;

use super::config::{TraversalStats, TreeConfig};
use super::node::QuadNode;
use super::pool::{NodeId, NodePool};
use super::scope::{LodEvaluator, Scope};
use crate::cache::BufferId;
use crate::constants::{Frame, ROOT_REQUEST_PRIORITY};
use crate::fetch::{ChannelHints, Request, TileHint};
use crate::index::TreeIndex;

/// Cached data the tree attaches to its nodes, one cache per channel.
///
/// Channel 0 is the primary channel whose content decides whether a node can
/// refine further.
pub trait NodeData<S: Scope> {
  fn channel_count(&self) -> usize;

  /// Valid buffer for `index` in `channel`, touched in `frame`. `held` is
  /// the handle the node had last frame.
  fn refresh(
    &mut self,
    channel: usize,
    index: TreeIndex,
    held: Option<BufferId>,
    frame: Frame,
  ) -> Option<BufferId>;

  /// Valid buffer for `index` in `channel`, without touching it.
  fn lookup(&self, channel: usize, index: TreeIndex) -> Option<BufferId>;

  /// Where child `which` lives, judging from the parent's buffer.
  fn child_hint(&self, channel: usize, parent: Option<BufferId>, which: u8) -> TileHint;

  /// True if the primary channel has data deeper than `index`.
  fn can_refine(&self, index: TreeIndex, primary: Option<BufferId>) -> bool;

  fn request(&mut self, request: Request<S>);
}

/// Read-only view of one visible leaf.
#[derive(Clone, Copy, Debug)]
pub struct LeafView<'a, S> {
  pub id: NodeId,
  pub index: TreeIndex,
  pub scope: &'a S,
  pub data: &'a [Option<BufferId>],
  pub lod: f64,
}

/// Dynamically split and merged quadtree.
pub struct QuadTerrain<S: Scope> {
  pool: NodePool<QuadNode<S>>,
  roots: Vec<NodeId>,
  config: TreeConfig,
  channels: usize,
}

impl<S: Scope> QuadTerrain<S> {
  /// One root per scope, patch numbers in order.
  pub fn new(root_scopes: Vec<S>, channels: usize, config: TreeConfig) -> Self {
    let mut pool = NodePool::new();
    let roots = root_scopes
      .into_iter()
      .enumerate()
      .map(|(patch, scope)| {
        pool.alloc_root(QuadNode::new(TreeIndex::root(patch as u8), None, scope, channels))
      })
      .collect();
    Self {
      pool,
      roots,
      config,
      channels,
    }
  }

  pub fn config(&self) -> &TreeConfig {
    &self.config
  }

  pub fn set_config(&mut self, config: TreeConfig) {
    self.config = config;
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn roots(&self) -> &[NodeId] {
    &self.roots
  }

  pub fn node(&self, id: NodeId) -> Option<&QuadNode<S>> {
    self.pool.get(id)
  }

  /// Live nodes, roots included.
  pub fn node_count(&self) -> usize {
    self.pool.live()
  }

  pub fn pool(&self) -> &NodePool<QuadNode<S>> {
    &self.pool
  }

  // ===========================================================================
  // Traversal
  // ===========================================================================

  /// Update the tree for `frame`, touching every active buffer and emitting
  /// requests for missing data.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "tree::traverse"))]
  pub fn traverse<E, D>(&mut self, frame: Frame, eval: &E, data: &mut D) -> TraversalStats
  where
    E: LodEvaluator<S>,
    D: NodeData<S>,
  {
    debug_assert_eq!(data.channel_count(), self.channels);
    let mut stats = TraversalStats::default();
    for root in self.roots.clone() {
      self.visit(root, frame, eval, data, &mut stats);
    }
    trace!(
      frame,
      visited = stats.visited,
      splits = stats.splits,
      merges = stats.merges,
      requests = stats.requests,
      "tree traversal"
    );
    stats
  }

  fn visit<E, D>(&mut self, id: NodeId, frame: Frame, eval: &E, data: &mut D, stats: &mut TraversalStats)
  where
    E: LodEvaluator<S>,
    D: NodeData<S>,
  {
    stats.visited += 1;
    let Some(node) = self.pool.get_mut(id) else {
      return;
    };

    for (channel, handle) in node.data.iter_mut().enumerate() {
      *handle = data.refresh(channel, node.index, *handle, frame);
    }

    let level = node.index.level();
    node.visible = eval.visible(&node.scope, level);
    node.lod = eval.lod(&node.scope, level);

    if !node.has_all_data() && (node.visible || node.parent.is_none()) {
      let priority = if node.parent.is_none() {
        ROOT_REQUEST_PRIORITY
      } else {
        node.lod.abs()
      };
      data.request(Request::new(node.index, node.scope.clone(), priority));
      stats.requests += 1;
    }

    if !node.visible {
      if !node.is_leaf() {
        self.merge(id);
        stats.merges += 1;
      }
      stats.leaves += 1;
      return;
    }

    let primary = node.data.first().copied().flatten();
    let (index, lod, children) = (node.index, node.lod, node.children);
    if let Some(first) = children {
      if lod < self.config.merge_below && self.config.can_merge(stats.merges) {
        self.merge(id);
        stats.merges += 1;
        stats.leaves += 1;
        return;
      }
      for which in 0..4 {
        self.visit(first.offset(which), frame, eval, data, stats);
      }
      return;
    }

    let wants_split = lod > self.config.split_above
      && level < self.config.max_level
      && data.can_refine(index, primary);
    if wants_split && self.config.can_split(stats.splits) {
      if let Some(first) = self.try_split(id, data, stats) {
        stats.splits += 1;
        for which in 0..4 {
          self.visit(first.offset(which), frame, eval, data, stats);
        }
        return;
      }
    }
    stats.leaves += 1;
  }

  /// Split `id` if every channel of all four children is cached; otherwise
  /// request what is missing and leave the node a leaf.
  fn try_split<D: NodeData<S>>(
    &mut self,
    id: NodeId,
    data: &mut D,
    stats: &mut TraversalStats,
  ) -> Option<NodeId> {
    let node = self.pool.get(id)?;
    let child_indices = node.index.children().ok()?;
    let child_scopes = node.scope.split();

    let mut ready = true;
    for (which, child) in child_indices.iter().enumerate() {
      let missing = (0..self.channels).any(|channel| data.lookup(channel, *child).is_none());
      if !missing {
        continue;
      }
      ready = false;
      let hints: ChannelHints = (0..self.channels)
        .map(|channel| data.child_hint(channel, node.data[channel], which as u8))
        .collect();
      data.request(
        Request::new(*child, child_scopes[which].clone(), node.lod.abs()).with_hints(hints),
      );
      stats.requests += 1;
    }
    if !ready {
      stats.deferred_splits += 1;
      return None;
    }

    Some(self.split(id, child_indices, child_scopes))
  }

  /// Attach four children unconditionally. Handles start empty and are
  /// filled by the children's first visit.
  fn split(&mut self, id: NodeId, indices: [TreeIndex; 4], scopes: [S; 4]) -> NodeId {
    let channels = self.channels;
    let mut indices = indices.into_iter();
    let nodes = scopes.map(|scope| {
      let index = indices.next().unwrap_or(TreeIndex::INVALID);
      QuadNode::new(index, Some(id), scope, channels)
    });
    let first = self.pool.alloc_block(nodes);
    if let Some(node) = self.pool.get_mut(id) {
      node.children = Some(first);
      trace!(index = %node.index, "split");
    }
    first
  }

  /// Collapse the subtree below `id`, grandchildren first.
  fn merge(&mut self, id: NodeId) {
    let Some(first) = self.pool.get_mut(id).and_then(|node| node.children.take()) else {
      return;
    };
    for which in 0..4 {
      self.merge(first.offset(which));
    }
    if self.pool.free_block(first).is_some() {
      trace!(node = ?id, "merge");
    }
  }

  /// Split `id` without checking data, LOD or budgets. Returns the first
  /// child, or `None` if `id` is not a leaf or is at the deepest level.
  pub fn force_split(&mut self, id: NodeId) -> Option<NodeId> {
    let node = self.pool.get(id)?;
    if !node.is_leaf() {
      return None;
    }
    let indices = node.index.children().ok()?;
    let scopes = node.scope.split();
    Some(self.split(id, indices, scopes))
  }

  /// Merge the subtree below `id`. Returns whether anything was merged.
  pub fn force_merge(&mut self, id: NodeId) -> bool {
    let split = self.pool.get(id).is_some_and(|node| !node.is_leaf());
    if split {
      self.merge(id);
    }
    split
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// Visible leaves in depth-first order.
  pub fn leaves(&self) -> Leaves<'_, S> {
    let mut stack = self.roots.clone();
    stack.reverse();
    Leaves { tree: self, stack }
  }

  /// Every leaf, visible or not.
  pub fn all_leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
    let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
    std::iter::from_fn(move || {
      while let Some(id) = stack.pop() {
        let node = self.pool.get(id)?;
        match node.children {
          Some(first) => stack.extend((0..4).rev().map(|w| first.offset(w))),
          None => return Some(id),
        }
      }
      None
    })
  }

  /// Verify parent/child links: every split node has exactly four live
  /// children pointing back at it.
  pub fn check_invariants(&self) -> Result<(), String> {
    let mut stack = self.roots.clone();
    let mut seen = 0usize;
    while let Some(id) = stack.pop() {
      let node = self
        .pool
        .get(id)
        .ok_or_else(|| format!("{id:?} is reachable but vacant"))?;
      seen += 1;
      if node.data.len() != self.channels {
        return Err(format!("{id:?} holds {} channels", node.data.len()));
      }
      if let Some(first) = node.children {
        for which in 0..4u8 {
          let child_id = first.offset(which);
          let child = self
            .pool
            .get(child_id)
            .ok_or_else(|| format!("{id:?} child {which} vacant"))?;
          if child.parent != Some(id) {
            return Err(format!("{child_id:?} parent is {:?}, expected {id:?}", child.parent));
          }
          if child.index.child() != which || child.index.level() != node.index.level() + 1 {
            return Err(format!("{child_id:?} has index {} under {}", child.index, node.index));
          }
          stack.push(child_id);
        }
      }
    }
    if seen != self.pool.live() {
      return Err(format!("{} live nodes, {seen} reachable", self.pool.live()));
    }
    Ok(())
  }
}

/// Iterator over visible leaves, see [`QuadTerrain::leaves`].
pub struct Leaves<'a, S: Scope> {
  tree: &'a QuadTerrain<S>,
  stack: Vec<NodeId>,
}

impl<'a, S: Scope> Iterator for Leaves<'a, S> {
  type Item = LeafView<'a, S>;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(id) = self.stack.pop() {
      let Some(node) = self.tree.pool.get(id) else {
        continue;
      };
      match node.children {
        Some(first) => self.stack.extend((0..4).rev().map(|w| first.offset(w))),
        None if node.visible => {
          return Some(LeafView {
            id,
            index: node.index,
            scope: &node.scope,
            data: &node.data,
            lod: node.lod,
          });
        }
        None => {}
      }
    }
    None
  }
}

#[cfg(test)]
#[path = "terrain_test.rs"]
mod terrain_test;
