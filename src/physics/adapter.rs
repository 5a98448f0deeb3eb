use std::sync::Arc;

use glam::{Affine3A, Vec3};

use crate::errors::{Result, SpatialError};
use crate::physics::body::{DynamicsCategory, SharedRigidBody};
use crate::scene::transform::Transform;
use crate::scene::{NodeHandle, NodeKind, SceneGraph};

/// Scene node whose world matrix is exchanged with a rigid body.
///
/// Always absolute: ancestors only matter for kinematic bodies, whose world
/// matrix is the ancestor composition pushed into the body. For static and
/// dynamic bodies the matrix is read from the body.
///
/// `base_transform` is a fixed local offset appended after the body matrix.
/// It reintroduces scaling that rigid bodies cannot carry.
#[derive(Debug, Clone)]
pub struct RigidBodyTransform {
    pub(crate) transform: Transform,
    body: Option<SharedRigidBody>,
    base_transform: Affine3A,
    // Body matrix from the last exchange (read or written).
    body_world: Affine3A,
}

impl RigidBodyTransform {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_transform(Affine3A::IDENTITY)
    }

    #[must_use]
    pub fn with_base_transform(base_transform: Affine3A) -> Self {
        let mut transform = Transform::new();
        transform.set_absolute(true);
        Self {
            transform,
            body: None,
            base_transform,
            body_world: Affine3A::IDENTITY,
        }
    }

    /// Offset that restores the scaling stripped from the collision geometry.
    #[must_use]
    pub fn with_scaling(scaling: Vec3) -> Self {
        Self::with_base_transform(Affine3A::from_scale(scaling))
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn base_transform(&self) -> &Affine3A {
        &self.base_transform
    }

    pub fn set_base_transform(&mut self, base_transform: Affine3A) {
        self.base_transform = base_transform;
        self.transform.set_world(self.body_world * self.base_transform);
    }

    #[inline]
    #[must_use]
    pub fn rigid_body(&self) -> Option<&SharedRigidBody> {
        self.body.as_ref()
    }

    /// Category of the attached body.
    ///
    /// A body destroyed on the physics side is only released on the adapter's
    /// next traversal, so until then its last category is still reported.
    #[must_use]
    pub fn dynamics_category(&self) -> Option<DynamicsCategory> {
        self.body.as_ref().map(|body| body.read().dynamics_category())
    }

    /// Takes ownership of `body` on behalf of the node `owner`.
    ///
    /// The world matrix is seeded from the body immediately, so it is valid
    /// before the first simulation step or traversal. Returns the previously
    /// attached body, already released.
    pub(crate) fn attach(
        &mut self,
        body: SharedRigidBody,
        owner: NodeHandle,
    ) -> Result<Option<SharedRigidBody>> {
        if let Some(current) = &self.body
            && Arc::ptr_eq(current, &body)
        {
            return Ok(None);
        }

        {
            let mut guard = body.write();
            if let Some(existing) = guard.owner {
                return Err(SpatialError::RigidBodyAlreadyAttached {
                    body: guard.name().to_string(),
                    owner: existing,
                });
            }
            guard.owner = Some(owner);
            self.body_world = guard.transform();
        }

        let previous = self.detach();
        self.body = Some(body);
        self.transform.set_world(self.body_world * self.base_transform);
        Ok(previous)
    }

    /// Releases the body and clears its back-reference.
    pub(crate) fn detach(&mut self) -> Option<SharedRigidBody> {
        let body = self.body.take()?;
        body.write().owner = None;
        Some(body)
    }

    /// Exchanges the world matrix with the body for one traversal step.
    ///
    /// `ancestor_to_world` is the nearest ancestor's world matrix, used only
    /// when the body is kinematic.
    pub(crate) fn exchange(&mut self, ancestor_to_world: Option<&Affine3A>) {
        let Some(shared) = &self.body else {
            return;
        };

        let mut body = shared.write();
        if body.is_destroyed() {
            log::warn!(
                "Rigid body '{}' was destroyed by the physics side, detaching",
                body.name()
            );
            body.owner = None;
            drop(body);
            self.body = None;
            return;
        }

        match body.dynamics_category() {
            DynamicsCategory::Static => {}
            DynamicsCategory::Dynamic => {
                self.body_world = body.transform();
            }
            DynamicsCategory::Kinematic => {
                let world = ancestor_to_world.copied().unwrap_or(Affine3A::IDENTITY);
                body.set_transform(world);
                self.body_world = world;
            }
        }
        drop(body);

        self.transform.set_world(self.body_world * self.base_transform);
    }
}

impl Default for RigidBodyTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// Recomputes the base transform of every rigid-body adapter under `root` so
/// that each node keeps its current scene placement relative to its body.
///
/// Expects `root` to have been traversed, since it reads the ancestors' cached
/// world matrices. With `T` the nearest ancestor's world matrix and `R` the
/// body matrix:
/// - static / dynamic: `base = R⁻¹ · T`
/// - kinematic: `base = T⁻¹ · R`
///
/// Returns the number of adapters updated.
pub fn calibrate_rigid_body_offsets(graph: &mut SceneGraph, root: NodeHandle) -> Result<usize> {
    let mut calibrated = 0;

    for handle in graph.subtree(root)? {
        let Some(node) = graph.get(handle) else {
            continue;
        };
        let Some(adapter) = node.as_rigid_body() else {
            continue;
        };
        let Some(body) = adapter.rigid_body() else {
            continue;
        };

        let (category, body_world) = {
            let guard = body.read();
            (guard.dynamics_category(), guard.transform())
        };
        let ancestor_world = nearest_ancestor_world(graph, handle);

        let base = match category {
            DynamicsCategory::Static | DynamicsCategory::Dynamic => {
                body_world.inverse() * ancestor_world
            }
            DynamicsCategory::Kinematic => ancestor_world.inverse() * body_world,
        };

        if let Some(adapter) = graph.get_mut(handle).and_then(|n| n.as_rigid_body_mut()) {
            adapter.set_base_transform(base);
            calibrated += 1;
        }
    }

    log::debug!("Calibrated {calibrated} rigid body offsets");
    Ok(calibrated)
}

/// Cached world matrix of the closest transform-like ancestor. Stops at a
/// skeleton boundary, since joints live in the skeleton's own frame.
fn nearest_ancestor_world(graph: &SceneGraph, handle: NodeHandle) -> Affine3A {
    let mut current = graph.get(handle).and_then(|n| n.parent());
    while let Some(parent) = current {
        let Some(node) = graph.get(parent) else {
            break;
        };
        if matches!(node.kind(), NodeKind::Skeleton(_)) {
            break;
        }
        if let Some(transform) = node.as_transform() {
            return *transform.local_to_world();
        }
        current = node.parent();
    }
    Affine3A::IDENTITY
}
