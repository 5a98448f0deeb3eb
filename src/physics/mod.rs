//! Physics synchronisation module
//!
//! Bridges the scene graph and an external rigid-body simulation:
//! - [`RigidBody`]: per-body state crossing the boundary (category, transform, velocities)
//! - [`DynamicsWorld`]: body registry with a minimal integrator
//! - [`RigidBodyTransform`]: scene node exchanging its world matrix with a body
//!
//! The dynamics category of a body decides the direction of the exchange on
//! every traversal: static and dynamic bodies are read, kinematic bodies are
//! written. Never both in the same step.

pub mod adapter;
pub mod body;
pub mod world;

pub use adapter::{RigidBodyTransform, calibrate_rigid_body_offsets};
pub use body::{DynamicsCategory, RigidBody, RigidBodyDesc, SharedRigidBody};
pub use world::DynamicsWorld;
