//! Physics exchange tests
//!
//! Tests for:
//! - Static / kinematic / dynamic transform exchange during traversal
//! - Body lifetime and back-references
//! - Base transform calibration

use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};
use myth_spatial::physics::calibrate_rigid_body_offsets;
use myth_spatial::scene::SceneGraph;
use myth_spatial::{
    BoundingBox, DynamicsCategory, DynamicsWorld, NodeHandle, PhysicsSettings, RigidBodyDesc,
    RigidBodyTransform, SharedRigidBody, SpatialError,
};

const EPSILON: f32 = 1e-4;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn weightless_world() -> DynamicsWorld {
    init_logging();
    DynamicsWorld::with_settings(PhysicsSettings {
        gravity: Vec3::ZERO,
        ..Default::default()
    })
}

fn body_desc(category: DynamicsCategory, at: Vec3) -> RigidBodyDesc {
    RigidBodyDesc {
        name: "box".to_string(),
        category,
        transform: Affine3A::from_translation(at),
        ..Default::default()
    }
}

struct Setup {
    graph: SceneGraph,
    root: NodeHandle,
    parent: NodeHandle,
    adapter: NodeHandle,
}

/// Group -> Transform (+3 Z) -> RigidBodyTransform(body)
fn attach_under_parent(body: SharedRigidBody) -> Setup {
    let mut graph = SceneGraph::new();
    let root = graph.create_group();
    let parent = graph.create_transform(Affine3A::from_translation(Vec3::Z * 3.0));
    let adapter = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), Some(body))
        .unwrap();
    graph.add_child(root, parent).unwrap();
    graph.add_child(parent, adapter).unwrap();
    Setup {
        graph,
        root,
        parent,
        adapter,
    }
}

fn world_position(graph: &SceneGraph, handle: NodeHandle) -> Vec3 {
    graph.local_to_world(handle).unwrap().translation.into()
}

// ============================================================================
// Exchange
// ============================================================================

#[test]
fn matrix_is_valid_before_the_first_step() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Dynamic, Vec3::new(1.0, 2.0, 3.0)));
    let mut s = attach_under_parent(body);

    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::new(1.0, 2.0, 3.0)));

    s.graph.traverse(s.root);
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::new(1.0, 2.0, 3.0)));
}

#[test]
fn dynamic_body_drives_the_node() {
    let mut world = weightless_world();
    let body = world.add_body(RigidBodyDesc {
        linear_velocity: Vec3::X,
        ..body_desc(DynamicsCategory::Dynamic, Vec3::ZERO)
    });
    let mut s = attach_under_parent(Arc::clone(&body));
    let child = s.graph.create_transform(Affine3A::from_translation(Vec3::Y));
    s.graph.add_child(s.adapter, child).unwrap();

    world.step(1.0);
    s.graph.traverse(s.root);

    // Ancestors are ignored for dynamic bodies.
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::X));
    assert!(vec3_approx(world_position(&s.graph, child), Vec3::new(1.0, 1.0, 0.0)));
}

#[test]
fn switching_dynamic_to_kinematic_reverses_the_flow() {
    let mut world = weightless_world();
    let body = world.add_body(RigidBodyDesc {
        linear_velocity: Vec3::X,
        ..body_desc(DynamicsCategory::Dynamic, Vec3::ZERO)
    });
    let mut s = attach_under_parent(Arc::clone(&body));

    world.step(0.5);
    s.graph.traverse(s.root);
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::X * 0.5));

    body.write().set_dynamics_category(DynamicsCategory::Kinematic);
    s.graph.traverse(s.root);

    let parent_world = s.graph.local_to_world(s.parent).unwrap();
    assert!(body.read().transform().abs_diff_eq(parent_world, EPSILON));
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::Z * 3.0));

    // Kinematic bodies are not integrated.
    world.step(1.0);
    assert!(body.read().transform().abs_diff_eq(parent_world, EPSILON));
}

#[test]
fn switching_kinematic_to_dynamic_reads_the_body() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Kinematic, Vec3::ZERO));
    let mut s = attach_under_parent(Arc::clone(&body));

    s.graph.traverse(s.root);
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::Z * 3.0));

    {
        let mut guard = body.write();
        guard.set_dynamics_category(DynamicsCategory::Dynamic);
        guard.set_linear_velocity(Vec3::X);
    }
    world.step(1.0);
    s.graph.traverse(s.root);

    // Integrated from the last kinematic placement, no longer tied to the parent.
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::new(1.0, 0.0, 3.0)));
    assert!(
        s.graph
            .local_to_world(s.adapter)
            .unwrap()
            .abs_diff_eq(body.read().transform(), EPSILON)
    );

    s.graph
        .set_local_transform(s.parent, Affine3A::from_translation(Vec3::Y * 20.0))
        .unwrap();
    s.graph.traverse(s.root);
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::new(1.0, 0.0, 3.0)));
}

#[test]
fn kinematic_body_follows_moving_ancestor() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Kinematic, Vec3::ZERO));
    let mut s = attach_under_parent(Arc::clone(&body));

    s.graph.traverse(s.root);
    assert!(vec3_approx(body.read().transform().translation.into(), Vec3::Z * 3.0));

    s.graph
        .set_local_transform(
            s.parent,
            Affine3A::from_rotation_translation(
                Quat::from_rotation_y(0.4),
                Vec3::new(-2.0, 0.0, 0.0),
            ),
        )
        .unwrap();
    s.graph.traverse(s.root);

    let parent_world = s.graph.local_to_world(s.parent).unwrap();
    assert!(body.read().transform().abs_diff_eq(parent_world, EPSILON));
    assert!(
        s.graph
            .local_to_world(s.adapter)
            .unwrap()
            .abs_diff_eq(parent_world, EPSILON)
    );
}

#[test]
fn kinematic_adapter_at_root_pushes_identity() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Kinematic, Vec3::new(4.0, 4.0, 4.0)));
    let mut graph = SceneGraph::new();
    let adapter = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), Some(Arc::clone(&body)))
        .unwrap();

    graph.traverse(adapter);

    assert!(body.read().transform().abs_diff_eq(Affine3A::IDENTITY, EPSILON));
}

#[test]
fn static_body_ignores_scene_changes() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Static, Vec3::new(1.0, 0.0, 0.0)));
    let mut s = attach_under_parent(Arc::clone(&body));

    s.graph.traverse(s.root);
    s.graph
        .set_local_transform(s.parent, Affine3A::from_translation(Vec3::Y * 50.0))
        .unwrap();
    s.graph.traverse(s.root);

    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::X));
    assert!(vec3_approx(body.read().transform().translation.into(), Vec3::X));
}

#[test]
fn base_transform_reapplies_scaling() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Dynamic, Vec3::new(0.0, 1.0, 0.0)));
    let mut graph = SceneGraph::new();
    let adapter = graph
        .create_rigid_body_transform(RigidBodyTransform::with_scaling(Vec3::splat(2.0)), Some(body))
        .unwrap();
    let entity = graph.create_entity(BoundingBox::unit_cube());
    graph.add_child(adapter, entity).unwrap();

    let bounds = graph.traverse(adapter);

    assert!(vec3_approx(bounds.center(), Vec3::Y));
    assert!(vec3_approx(bounds.half_extents(), Vec3::ONE));
}

#[test]
fn adapter_without_body_keeps_its_matrix() {
    let mut graph = SceneGraph::new();
    let parent = graph.create_transform(Affine3A::from_translation(Vec3::X * 8.0));
    let adapter = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), None)
        .unwrap();
    graph.add_child(parent, adapter).unwrap();

    graph.traverse(parent);

    assert_eq!(graph.local_to_world(adapter).unwrap(), Affine3A::IDENTITY);
    assert_eq!(graph.dynamics_category(adapter), None);
}

// ============================================================================
// Lifetime
// ============================================================================

#[test]
fn body_destroyed_by_physics_is_released_on_next_traversal() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Dynamic, Vec3::X));
    let id = body.read().id();
    let mut s = attach_under_parent(Arc::clone(&body));
    s.graph.traverse(s.root);

    world.remove_body(id).unwrap();
    assert!(body.read().is_destroyed());
    // Still reported until the adapter is visited.
    assert_eq!(
        s.graph.dynamics_category(s.adapter),
        Some(DynamicsCategory::Dynamic)
    );
    s.graph.traverse(s.root);
    assert_eq!(s.graph.dynamics_category(s.adapter), None);

    let adapter = s.graph.get(s.adapter).unwrap().as_rigid_body().unwrap();
    assert!(adapter.rigid_body().is_none());
    assert_eq!(body.read().owner(), None);
    // Last known placement is kept.
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::X));
}

#[test]
fn body_can_only_be_driven_by_one_adapter() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Static, Vec3::ZERO));
    let mut graph = SceneGraph::new();
    let first = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), Some(Arc::clone(&body)))
        .unwrap();
    let before = graph.len();

    let err = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), Some(Arc::clone(&body)))
        .unwrap_err();

    assert!(matches!(err, SpatialError::RigidBodyAlreadyAttached { owner, .. } if owner == first));
    assert_eq!(graph.len(), before);
    assert_eq!(body.read().owner(), Some(first));
}

#[test]
fn reattaching_returns_the_released_body() {
    let mut world = weightless_world();
    let a = world.add_body(body_desc(DynamicsCategory::Static, Vec3::ZERO));
    let b = world.add_body(body_desc(DynamicsCategory::Static, Vec3::Y));
    let mut graph = SceneGraph::new();
    let adapter = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), Some(Arc::clone(&a)))
        .unwrap();

    let previous = graph.attach_rigid_body(adapter, Arc::clone(&b)).unwrap();

    assert!(previous.is_some_and(|p| Arc::ptr_eq(&p, &a)));
    assert_eq!(a.read().owner(), None);
    assert_eq!(b.read().owner(), Some(adapter));
    assert!(vec3_approx(world_position(&graph, adapter), Vec3::Y));
}

#[test]
fn destroying_the_adapter_clears_the_back_reference() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Dynamic, Vec3::ZERO));
    let mut s = attach_under_parent(Arc::clone(&body));

    s.graph.destroy(s.parent).unwrap();

    assert_eq!(body.read().owner(), None);
    assert!(!body.read().is_destroyed());
}

#[test]
fn dropping_the_graph_clears_back_references() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Dynamic, Vec3::ZERO));
    let s = attach_under_parent(Arc::clone(&body));
    assert!(body.read().owner().is_some());

    drop(s);

    assert_eq!(body.read().owner(), None);
}

#[test]
fn detach_rigid_body_rejects_other_nodes() {
    let mut graph = SceneGraph::new();
    let group = graph.create_group();
    assert_eq!(
        graph.detach_rigid_body(group).unwrap_err(),
        SpatialError::NotARigidBodyTransform(group)
    );
}

// ============================================================================
// Calibration
// ============================================================================

#[test]
fn calibration_keeps_dynamic_node_at_scene_placement() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Dynamic, Vec3::new(0.0, 5.0, 0.0)));
    let mut s = attach_under_parent(body);
    s.graph.traverse(s.root);

    let calibrated = calibrate_rigid_body_offsets(&mut s.graph, s.root).unwrap();
    assert_eq!(calibrated, 1);

    // base = R⁻¹ · T, so body · base lands back on the ancestor placement.
    s.graph.traverse(s.root);
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::Z * 3.0));
}

#[test]
fn calibration_keeps_kinematic_node_at_body_placement() {
    let mut world = weightless_world();
    let body = world.add_body(body_desc(DynamicsCategory::Kinematic, Vec3::new(0.0, 5.0, 0.0)));
    let mut s = attach_under_parent(Arc::clone(&body));
    s.graph.traverse(s.root);

    // The first traversal pushed the ancestor placement into the body; put it back.
    body.write().set_transform(Affine3A::from_translation(Vec3::new(0.0, 5.0, 0.0)));
    calibrate_rigid_body_offsets(&mut s.graph, s.root).unwrap();
    let adapter = s.graph.get(s.adapter).unwrap().as_rigid_body().unwrap();
    assert!(vec3_approx(
        adapter.base_transform().translation.into(),
        Vec3::new(0.0, 5.0, -3.0)
    ));
    s.graph.traverse(s.root);

    // base = T⁻¹ · R: the body follows the ancestor, the node keeps the body's placement.
    assert!(vec3_approx(body.read().transform().translation.into(), Vec3::Z * 3.0));
    assert!(vec3_approx(world_position(&s.graph, s.adapter), Vec3::new(0.0, 5.0, 0.0)));
}

#[test]
fn calibration_skips_adapters_without_bodies() {
    let mut graph = SceneGraph::new();
    let root = graph.create_group();
    let adapter = graph
        .create_rigid_body_transform(RigidBodyTransform::new(), None)
        .unwrap();
    graph.add_child(root, adapter).unwrap();

    assert_eq!(calibrate_rigid_body_offsets(&mut graph, root).unwrap(), 0);
}
