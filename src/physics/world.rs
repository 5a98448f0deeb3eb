use std::sync::Arc;

use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::physics::body::{RigidBody, RigidBodyDesc, SharedRigidBody};
use crate::settings::PhysicsSettings;

/// Registry of rigid bodies with a minimal integrator.
///
/// Stands in for the simulation side of the per-frame exchange: bodies are
/// moved by [`step`](Self::step), then a scene traversal absorbs the results.
/// No constraints or contacts are resolved here.
#[derive(Debug, Default)]
pub struct DynamicsWorld {
    settings: PhysicsSettings,
    bodies: FxHashMap<Uuid, SharedRigidBody>,
    step_count: u64,
}

impl DynamicsWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: PhysicsSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    /// Creates a body and registers it.
    pub fn add_body(&mut self, desc: RigidBodyDesc) -> SharedRigidBody {
        let body = RigidBody::shared(desc);
        self.insert(Arc::clone(&body));
        body
    }

    /// Registers an existing body.
    pub fn insert(&mut self, body: SharedRigidBody) {
        let id = body.read().id();
        self.bodies.insert(id, body);
    }

    /// Destroys a body on the physics side.
    ///
    /// The body is flagged destroyed; a scene adapter still holding it drops
    /// its reference on the next traversal.
    pub fn remove_body(&mut self, id: Uuid) -> Option<SharedRigidBody> {
        let body = self.bodies.remove(&id)?;
        {
            let mut guard = body.write();
            guard.mark_destroyed();
            log::debug!("Destroyed rigid body '{}' ({id})", guard.name());
        }
        Some(body)
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&SharedRigidBody> {
        self.bodies.get(&id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &SharedRigidBody> {
        self.bodies.values()
    }

    /// Number of completed `step` calls.
    #[inline]
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Advances every dynamic body by `dt` seconds, in equal substeps no longer
    /// than `max_substep`.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let substeps = if self.settings.max_substep > 0.0 {
            (dt / self.settings.max_substep).ceil().max(1.0) as u32
        } else {
            1
        };
        let h = dt / substeps as f32;

        for body in self.bodies.values() {
            let mut body = body.write();
            for _ in 0..substeps {
                body.integrate(h, self.settings.gravity);
            }
        }

        self.step_count += 1;
        log::trace!(
            "Physics step #{}: dt={dt}, substeps={substeps}, bodies={}",
            self.step_count,
            self.bodies.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::physics::DynamicsCategory;

    #[test]
    fn step_splits_into_substeps() {
        let mut world = DynamicsWorld::with_settings(PhysicsSettings {
            gravity: Vec3::ZERO,
            max_substep: 0.25,
        });
        let body = world.add_body(RigidBodyDesc {
            category: DynamicsCategory::Dynamic,
            linear_velocity: Vec3::new(2.0, 0.0, 0.0),
            ..Default::default()
        });

        world.step(1.0);

        let x = body.read().transform().translation.x;
        assert!((x - 2.0).abs() < 1e-5);
        assert_eq!(world.step_count(), 1);
    }

    #[test]
    fn remove_marks_destroyed() {
        let mut world = DynamicsWorld::new();
        let body = world.add_body(RigidBodyDesc::default());
        let id = body.read().id();

        assert!(world.remove_body(id).is_some());
        assert!(body.read().is_destroyed());
        assert!(world.is_empty());
        assert!(world.remove_body(id).is_none());
    }
}
