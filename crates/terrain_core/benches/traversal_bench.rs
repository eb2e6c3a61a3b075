//! Tree traversal benchmarks over procedural data.
//!
//! - **settle**: frames until a fresh tree stops refining
//! - **steady**: one frame over an already refined tree

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::DVec3;
use terrain_core::{
  fetch::ChannelCache, DataManager, EvictionPolicy, Height, Polyhedron, ProceduralSource, QuadScope,
  QuadTerrain, TileSource, TreeConfig, TreeIndex, ViewerLod,
};

fn manager(max_level: u8) -> DataManager<QuadScope> {
  let source: Arc<dyn TileSource<Height, QuadScope>> = Arc::new(ProceduralSource::<Height, _>::new(
    [17, 17],
    -32768.0,
    max_level,
    |index: TreeIndex, scope: &QuadScope, payload: &mut [f32]| {
      let center = scope.center();
      let base = (center.x.sin() * center.z.cos()) as f32;
      for (n, v) in payload.iter_mut().enumerate() {
        *v = base + (n as f32 * 0.01) + index.level() as f32;
      }
    },
  ));
  let mut manager = DataManager::new(ChannelCache::new("dem", 8192, EvictionPolicy::ProtectCurrent, source));
  manager.set_budget(Duration::from_secs(1));
  manager
}

fn viewer() -> ViewerLod {
  ViewerLod::new(DVec3::new(0.0, 1.05, 0.0), 4.0)
}

fn settle(tree: &mut QuadTerrain<QuadScope>, data: &mut DataManager<QuadScope>, eval: &ViewerLod) -> u64 {
  let mut frame = 0;
  loop {
    frame += 1;
    let stats = tree.traverse(frame, eval, data);
    let report = data.process_frame(frame);
    if (stats.splits == 0 && stats.requests == 0 && report.requests == 0) || frame > 64 {
      return frame;
    }
  }
}

fn bench_settle(c: &mut Criterion) {
  let eval = viewer();
  c.bench_function("traversal/settle_cube", |b| {
    b.iter(|| {
      let mut data = manager(8);
      let mut tree = QuadTerrain::new(Polyhedron::Cube.root_scopes(1.0), 1, TreeConfig::DEFAULT);
      black_box(settle(&mut tree, &mut data, &eval))
    })
  });
}

fn bench_steady(c: &mut Criterion) {
  let eval = viewer();
  let mut data = manager(8);
  let mut tree = QuadTerrain::new(Polyhedron::Cube.root_scopes(1.0), 1, TreeConfig::DEFAULT);
  let mut frame = settle(&mut tree, &mut data, &eval);
  c.bench_function("traversal/steady_cube", |b| {
    b.iter(|| {
      frame += 1;
      let stats = tree.traverse(frame, &eval, &mut data);
      black_box(stats.leaves)
    })
  });
}

criterion_group!(traversal, bench_settle, bench_steady);
criterion_main!(traversal);
