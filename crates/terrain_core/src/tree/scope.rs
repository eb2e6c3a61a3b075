//! Node bounds and LOD evaluation seams.
//!
//! The tree never interprets a node's bounds itself: it only asks a
//! [`Scope`] to split into four and a [`LodEvaluator`] whether a scope is
//! visible and how much it wants to refine.
//!
//! # Child Layout
//!
//! ```text
//!   corner 2 ──────── corner 3        child selector bits:
//!      │  child 2 │ child 3 │           bit 0 = +u (x)
//!      ├──────────┼─────────┤           bit 1 = +v (y)
//!      │  child 0 │ child 1 │
//!   corner 0 ──────── corner 1
//! ```

use glam::DVec3;

/// Opaque bounds of a tree node.
pub trait Scope: Clone + Send + 'static {
  /// Bounds of the four children, indexed by child selector.
  fn split(&self) -> [Self; 4];
}

/// Decides visibility and refinement for a scope.
///
/// `lod` returns a signed estimate: values above the tree's split threshold
/// ask for more detail, values below its merge threshold ask for less.
pub trait LodEvaluator<S: Scope> {
  fn visible(&self, scope: &S, level: u8) -> bool;
  fn lod(&self, scope: &S, level: u8) -> f64;
}

// =============================================================================
// QuadScope
// =============================================================================

/// Bilinear quad, optionally projected onto a sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadScope {
  /// Corners in child-selector order (see module docs).
  pub corners: [DVec3; 4],
  /// Sphere radius the quad is projected onto; 0 keeps it flat.
  pub radius: f64,
}

impl QuadScope {
  /// Flat quad.
  pub fn flat(corners: [DVec3; 4]) -> Self {
    Self {
      corners,
      radius: 0.0,
    }
  }

  /// Quad whose corners and subdivisions lie on a sphere of `radius`.
  pub fn spherical(corners: [DVec3; 4], radius: f64) -> Self {
    let mut scope = Self { corners, radius };
    scope.corners = scope.corners.map(|c| scope.project(c));
    scope
  }

  /// Point at parametric coordinates `(u, v)` in `[0, 1]^2`.
  pub fn point(&self, u: f64, v: f64) -> DVec3 {
    let [c0, c1, c2, c3] = self.corners;
    let bottom = c0.lerp(c1, u);
    let top = c2.lerp(c3, u);
    self.project(bottom.lerp(top, v))
  }

  #[inline]
  fn project(&self, p: DVec3) -> DVec3 {
    if self.radius > 0.0 {
      p.normalize_or_zero() * self.radius
    } else {
      p
    }
  }

  pub fn center(&self) -> DVec3 {
    self.point(0.5, 0.5)
  }

  /// Radius of the sphere around [`center`](Self::center) enclosing all
  /// corners.
  pub fn bounding_radius(&self) -> f64 {
    let center = self.center();
    self
      .corners
      .iter()
      .map(|c| c.distance(center))
      .fold(0.0, f64::max)
  }

  /// Length of the longer diagonal.
  pub fn diagonal(&self) -> f64 {
    self.corners[0]
      .distance(self.corners[3])
      .max(self.corners[1].distance(self.corners[2]))
  }
}

impl Scope for QuadScope {
  fn split(&self) -> [Self; 4] {
    std::array::from_fn(|which| {
      let u0 = (which & 1) as f64 * 0.5;
      let v0 = ((which >> 1) & 1) as f64 * 0.5;
      Self {
        corners: [
          self.point(u0, v0),
          self.point(u0 + 0.5, v0),
          self.point(u0, v0 + 0.5),
          self.point(u0 + 0.5, v0 + 0.5),
        ],
        radius: self.radius,
      }
    })
  }
}

// =============================================================================
// ViewerLod
// =============================================================================

/// Distance-based evaluator for [`QuadScope`].
///
/// `lod = detail * diagonal / distance - 1`, so a scope seen at a distance of
/// `detail` diagonals sits at zero. Scopes facing away from the viewer on a
/// sphere, or farther than `far`, are invisible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerLod {
  pub eye: DVec3,
  pub detail: f64,
  pub far: f64,
  /// Enable horizon culling for spherical scopes.
  pub cull_backfaces: bool,
}

impl ViewerLod {
  pub fn new(eye: DVec3, detail: f64) -> Self {
    Self {
      eye,
      detail,
      far: f64::INFINITY,
      cull_backfaces: true,
    }
  }
}

impl LodEvaluator<QuadScope> for ViewerLod {
  fn visible(&self, scope: &QuadScope, level: u8) -> bool {
    let center = scope.center();
    let radius = scope.bounding_radius();
    let distance = center.distance(self.eye);
    if distance - radius > self.far {
      return false;
    }
    // Roots skip horizon culling.
    if level == 0 || !self.cull_backfaces || scope.radius <= 0.0 {
      return true;
    }
    // Beyond the horizon: every corner faces away from the eye.
    scope
      .corners
      .iter()
      .chain(std::iter::once(&center))
      .any(|&p| p.normalize_or_zero().dot(self.eye - p) > -radius)
  }

  fn lod(&self, scope: &QuadScope, _level: u8) -> f64 {
    let distance = (scope.center().distance(self.eye) - scope.bounding_radius()).max(1e-9);
    self.detail * scope.diagonal() / distance - 1.0
  }
}

#[cfg(test)]
#[path = "scope_test.rs"]
mod scope_test;
