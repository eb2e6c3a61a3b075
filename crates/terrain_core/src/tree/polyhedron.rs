//! Root patch layouts.
//!
//! A dataset covers either one flat patch or a sphere tiled by the faces of
//! a polyhedron; every face is the root of one quadtree and one tile file.

use glam::DVec3;

use super::scope::QuadScope;

/// Arrangement of root patches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Polyhedron {
  /// One flat square patch.
  #[default]
  Plane,
  /// Six cube faces projected onto a sphere.
  Cube,
  /// Thirty rhombic faces projected onto a sphere.
  Triacontahedron,
}

impl Polyhedron {
  pub const ALL: [Self; 3] = [Self::Plane, Self::Cube, Self::Triacontahedron];

  pub fn num_patches(self) -> usize {
    match self {
      Self::Plane => 1,
      Self::Cube => 6,
      Self::Triacontahedron => 30,
    }
  }

  /// Name stored in the dataset layout file.
  pub fn name(self) -> &'static str {
    match self {
      Self::Plane => "plane",
      Self::Cube => "cube",
      Self::Triacontahedron => "triacontahedron",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|p| p.name().eq_ignore_ascii_case(name))
  }

  /// Scope of every root patch, in patch order.
  ///
  /// For `Plane`, `size` is the edge length of a flat square in the XZ
  /// plane centered on the origin; otherwise it is the sphere radius.
  pub fn root_scopes(self, size: f64) -> Vec<QuadScope> {
    match self {
      Self::Plane => {
        let h = size * 0.5;
        vec![QuadScope::flat([
          DVec3::new(-h, 0.0, -h),
          DVec3::new(h, 0.0, -h),
          DVec3::new(-h, 0.0, h),
          DVec3::new(h, 0.0, h),
        ])]
      }
      Self::Cube => cube_faces()
        .into_iter()
        .map(|corners| QuadScope::spherical(corners, size))
        .collect(),
      Self::Triacontahedron => rhombic_faces()
        .into_iter()
        .map(|corners| QuadScope::spherical(corners, size))
        .collect(),
    }
  }
}

fn cube_faces() -> Vec<[DVec3; 4]> {
  // (normal axis, u axis, v axis) for +X, -X, +Y, -Y, +Z, -Z.
  let axes = [
    (DVec3::X, DVec3::NEG_Z, DVec3::Y),
    (DVec3::NEG_X, DVec3::Z, DVec3::Y),
    (DVec3::Y, DVec3::X, DVec3::NEG_Z),
    (DVec3::NEG_Y, DVec3::X, DVec3::Z),
    (DVec3::Z, DVec3::X, DVec3::Y),
    (DVec3::NEG_Z, DVec3::NEG_X, DVec3::Y),
  ];
  axes
    .iter()
    .map(|&(n, u, v)| [n - u - v, n + u - v, n - u + v, n + u + v])
    .collect()
}

/// Faces of the rhombic triacontahedron: one per icosahedron edge, spanned by
/// the edge's end points and the centers of the two faces sharing it.
fn rhombic_faces() -> Vec<[DVec3; 4]> {
  let phi = (1.0 + 5f64.sqrt()) * 0.5;
  let mut vertices = Vec::with_capacity(12);
  for a in [-1.0, 1.0] {
    for b in [-phi, phi] {
      vertices.push(DVec3::new(0.0, a, b));
      vertices.push(DVec3::new(a, b, 0.0));
      vertices.push(DVec3::new(b, 0.0, a));
    }
  }

  // Icosahedron edges have length 2.
  let adjacent = |p: DVec3, q: DVec3| (p.distance(q) - 2.0).abs() < 1e-6;

  let mut faces = Vec::with_capacity(30);
  for i in 0..vertices.len() {
    for j in (i + 1)..vertices.len() {
      let (a, b) = (vertices[i], vertices[j]);
      if !adjacent(a, b) {
        continue;
      }
      let mut centers = vertices
        .iter()
        .filter(|&&c| adjacent(a, c) && adjacent(b, c))
        .map(|&c| (a + b + c) / 3.0);
      if let (Some(f0), Some(f1)) = (centers.next(), centers.next()) {
        // a and b are opposite corners of the rhombus.
        faces.push([a, f0, f1, b]);
      }
    }
  }
  faces
}

#[cfg(test)]
#[path = "polyhedron_test.rs"]
mod polyhedron_test;
