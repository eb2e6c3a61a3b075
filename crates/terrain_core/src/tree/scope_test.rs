use super::*;

fn unit_square() -> QuadScope {
  QuadScope::flat([
    DVec3::new(0.0, 0.0, 0.0),
    DVec3::new(1.0, 0.0, 0.0),
    DVec3::new(0.0, 1.0, 0.0),
    DVec3::new(1.0, 1.0, 0.0),
  ])
}

#[test]
fn test_split_follows_selector_bits() {
  let children = unit_square().split();
  assert_eq!(children[0].center(), DVec3::new(0.25, 0.25, 0.0));
  assert_eq!(children[1].center(), DVec3::new(0.75, 0.25, 0.0));
  assert_eq!(children[2].center(), DVec3::new(0.25, 0.75, 0.0));
  assert_eq!(children[3].center(), DVec3::new(0.75, 0.75, 0.0));
}

#[test]
fn test_split_children_share_corners() {
  let parent = unit_square();
  let children = parent.split();
  assert_eq!(children[0].corners[0], parent.corners[0]);
  assert_eq!(children[3].corners[3], parent.corners[3]);
  assert_eq!(children[0].corners[3], children[3].corners[0]);
  assert_eq!(children[1].corners[2], children[2].corners[1]);
}

#[test]
fn test_spherical_split_stays_on_sphere() {
  let scope = QuadScope::spherical(
    [
      DVec3::new(1.0, -1.0, -1.0),
      DVec3::new(1.0, 1.0, -1.0),
      DVec3::new(1.0, -1.0, 1.0),
      DVec3::new(1.0, 1.0, 1.0),
    ],
    10.0,
  );
  for child in scope.split() {
    for corner in child.corners {
      assert!((corner.length() - 10.0).abs() < 1e-9);
    }
  }
}

#[test]
fn test_spherical_projects_given_corners() {
  let scope = QuadScope::spherical(
    [
      DVec3::new(2.0, 0.0, 0.0),
      DVec3::new(0.0, 3.0, 0.0),
      DVec3::new(0.0, 0.0, 4.0),
      DVec3::new(1.0, 1.0, 1.0),
    ],
    5.0,
  );
  assert!((scope.corners[0] - DVec3::new(5.0, 0.0, 0.0)).length() < 1e-9);
  assert!((scope.corners[1] - DVec3::new(0.0, 5.0, 0.0)).length() < 1e-9);
  assert!((scope.corners[2] - DVec3::new(0.0, 0.0, 5.0)).length() < 1e-9);
  assert!((scope.corners[3].length() - 5.0).abs() < 1e-9);
}

#[test]
fn test_diagonal_halves_on_split() {
  let parent = unit_square();
  let child = parent.split()[0];
  assert!((child.diagonal() * 2.0 - parent.diagonal()).abs() < 1e-12);
}

#[test]
fn test_viewer_lod_grows_when_closer() {
  let scope = unit_square();
  let near = ViewerLod::new(DVec3::new(0.5, 0.5, 2.0), 4.0);
  let far = ViewerLod::new(DVec3::new(0.5, 0.5, 200.0), 4.0);
  assert!(near.lod(&scope, 0) > far.lod(&scope, 0));
  assert!(far.lod(&scope, 0) < 0.0);
}

#[test]
fn test_viewer_far_plane_culls() {
  let scope = unit_square();
  let mut viewer = ViewerLod::new(DVec3::new(0.5, 0.5, 100.0), 1.0);
  assert!(viewer.visible(&scope, 3));
  viewer.far = 10.0;
  assert!(!viewer.visible(&scope, 3));
}

#[test]
fn test_horizon_culls_far_side_of_sphere() {
  let near_side = QuadScope::spherical(
    [
      DVec3::new(1.0, -0.1, -0.1),
      DVec3::new(1.0, 0.1, -0.1),
      DVec3::new(1.0, -0.1, 0.1),
      DVec3::new(1.0, 0.1, 0.1),
    ],
    1.0,
  );
  let far_side = QuadScope::spherical(
    [
      DVec3::new(-1.0, -0.1, -0.1),
      DVec3::new(-1.0, 0.1, -0.1),
      DVec3::new(-1.0, -0.1, 0.1),
      DVec3::new(-1.0, 0.1, 0.1),
    ],
    1.0,
  );
  let viewer = ViewerLod::new(DVec3::new(3.0, 0.0, 0.0), 1.0);
  assert!(viewer.visible(&near_side, 2));
  assert!(!viewer.visible(&far_side, 2));
  // Roots are never horizon culled.
  assert!(viewer.visible(&far_side, 0));
}
