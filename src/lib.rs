//! Scene-graph transform engine.
//!
//! Keeps cached world-space matrices of a node hierarchy consistent, refreshes
//! only the subtrees that changed, runs skeletons as independent traversal
//! domains and exchanges transforms with a rigid-body simulation.
//!
//! ```rust,ignore
//! use glam::{Affine3A, Vec3};
//! use myth_spatial::{BoundingBox, SceneGraph};
//!
//! let mut graph = SceneGraph::new();
//! let root = graph.create_group();
//! let t1 = graph.create_transform(Affine3A::from_translation(Vec3::X * 5.0));
//! let entity = graph.create_entity(BoundingBox::unit_cube());
//! graph.add_child(root, t1)?;
//! graph.add_child(t1, entity)?;
//!
//! let bounds = graph.traverse(root);
//! assert_eq!(bounds.center(), Vec3::new(5.0, 0.0, 0.0));
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bounds;
pub mod errors;
pub mod physics;
pub mod scene;
pub mod settings;

pub use bounds::BoundingBox;
pub use errors::{Result, SpatialError};
pub use physics::{
    DynamicsCategory, DynamicsWorld, RigidBody, RigidBodyDesc, RigidBodyTransform, SharedRigidBody,
};
pub use scene::{
    Entity, Joint, Node, NodeHandle, NodeKind, SceneGraph, Skeleton, Transform, Traversal,
    TraverseVisitor, VisitMask,
};
pub use settings::{PhysicsSettings, TraversalSettings};
