//! Traversal benchmarks
//!
//! - `deep_chain`: one long parent chain, root modified every iteration
//! - `wide_tree`: many shallow branches, a single leaf modified per iteration
//! - `clean_pass`: nothing modified, measures the cost of the dirty checks

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::{Affine3A, Quat, Vec3};
use myth_spatial::scene::{SceneGraph, TraverseVisitor};
use myth_spatial::{BoundingBox, NodeHandle};

fn build_chain(depth: usize) -> (SceneGraph, Vec<NodeHandle>) {
    let mut graph = SceneGraph::with_capacity(depth);
    let mut handles = Vec::with_capacity(depth);
    for i in 0..depth {
        let handle = graph.create_transform(Affine3A::from_translation(Vec3::X));
        if let Some(&parent) = handles.last() {
            graph.add_child(parent, handle).unwrap();
        }
        if i + 1 == depth {
            let entity = graph.create_entity(BoundingBox::unit_cube());
            graph.add_child(handle, entity).unwrap();
        }
        handles.push(handle);
    }
    (graph, handles)
}

/// Root group with `branches` transforms, each owning `leaves` transform + entity pairs.
fn build_wide(branches: usize, leaves: usize) -> (SceneGraph, NodeHandle, Vec<NodeHandle>) {
    let mut graph = SceneGraph::with_capacity(1 + branches * (1 + leaves * 2));
    let root = graph.create_group();
    let mut leaf_handles = Vec::with_capacity(branches * leaves);
    for b in 0..branches {
        let branch = graph.create_transform(Affine3A::from_rotation_translation(
            Quat::from_rotation_y(b as f32 * 0.1),
            Vec3::new(b as f32, 0.0, 0.0),
        ));
        graph.add_child(root, branch).unwrap();
        for l in 0..leaves {
            let leaf = graph.create_transform(Affine3A::from_translation(Vec3::Y * l as f32));
            let entity = graph.create_entity(BoundingBox::unit_cube());
            graph.add_child(branch, leaf).unwrap();
            graph.add_child(leaf, entity).unwrap();
            leaf_handles.push(leaf);
        }
    }
    (graph, root, leaf_handles)
}

fn bench_deep_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_chain");
    let visitor = TraverseVisitor::new();

    for depth in [100, 1_000, 4_000] {
        let (mut graph, handles) = build_chain(depth);
        let root = handles[0];
        let mut angle = 0.0_f32;

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                angle += 0.01;
                graph
                    .set_local_transform(root, Affine3A::from_rotation_z(angle))
                    .unwrap();
                black_box(visitor.traverse(&mut graph, root));
            });
        });
    }
    group.finish();
}

fn bench_wide_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_tree");
    let visitor = TraverseVisitor::new();

    for (branches, leaves) in [(32, 32), (128, 64)] {
        let (mut graph, root, leaves_list) = build_wide(branches, leaves);
        visitor.traverse(&mut graph, root);
        let mut i = 0;

        group.bench_function(BenchmarkId::new("single_leaf_dirty", branches * leaves), |b| {
            b.iter(|| {
                let leaf = leaves_list[i % leaves_list.len()];
                i += 1;
                graph
                    .set_local_transform(leaf, Affine3A::from_translation(Vec3::Z * i as f32))
                    .unwrap();
                black_box(visitor.traverse(&mut graph, root));
            });
        });
    }
    group.finish();
}

fn bench_clean_pass(c: &mut Criterion) {
    let visitor = TraverseVisitor::new();
    let (mut graph, root, _) = build_wide(128, 64);
    visitor.traverse(&mut graph, root);

    c.bench_function("clean_pass_8k", |b| {
        b.iter(|| black_box(visitor.traverse(&mut graph, root)));
    });
}

criterion_group!(benches, bench_deep_chain, bench_wide_tree, bench_clean_pass);
criterion_main!(benches);
