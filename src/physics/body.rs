use std::fmt;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::scene::NodeHandle;

/// Which side owns a body's transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DynamicsCategory {
    /// Never moves; the scene keeps the transform seen at attach time.
    #[default]
    Static,
    /// Moved by the scene graph; the simulation treats it as collision-only.
    Kinematic,
    /// Moved by the simulation; the scene graph reads it back.
    Dynamic,
}

impl fmt::Display for DynamicsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Kinematic => "kinematic",
            Self::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// Construction parameters of a [`RigidBody`].
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyDesc {
    pub name: String,
    pub category: DynamicsCategory,
    /// Initial world transform. Rigid: any scaling is stripped on construction.
    pub transform: Affine3A,
    pub mass: f32,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            category: DynamicsCategory::Static,
            transform: Affine3A::IDENTITY,
            mass: 1.0,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// Rigid body state shared between the simulation and the scene graph.
///
/// The body keeps a non-owning back-reference to the scene node driving it,
/// so a body can be driven by at most one adapter at a time.
#[derive(Debug)]
pub struct RigidBody {
    id: Uuid,
    desc: RigidBodyDesc,
    transform: Affine3A,
    pub(crate) owner: Option<NodeHandle>,
    destroyed: bool,
}

/// Shared ownership handle used by both the physics world and scene adapters.
pub type SharedRigidBody = Arc<RwLock<RigidBody>>;

impl RigidBody {
    #[must_use]
    pub fn new(desc: RigidBodyDesc) -> Self {
        let transform = strip_scale(&desc.transform);
        Self {
            id: Uuid::new_v4(),
            desc,
            transform,
            owner: None,
            destroyed: false,
        }
    }

    #[must_use]
    pub fn shared(desc: RigidBodyDesc) -> SharedRigidBody {
        Arc::new(RwLock::new(Self::new(desc)))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    #[inline]
    #[must_use]
    pub fn dynamics_category(&self) -> DynamicsCategory {
        self.desc.category
    }

    /// Changes the authoritative side. Takes effect on the next traversal.
    pub fn set_dynamics_category(&mut self, category: DynamicsCategory) {
        if self.desc.category != category {
            log::debug!(
                "Rigid body '{}' switched from {} to {}",
                self.desc.name,
                self.desc.category,
                category
            );
            self.desc.category = category;
        }
    }

    /// World transform as of the last simulation step or kinematic write.
    #[inline]
    #[must_use]
    pub fn transform(&self) -> Affine3A {
        self.transform
    }

    /// Moves the body. Scaling is stripped; bodies are rigid.
    pub fn set_transform(&mut self, transform: Affine3A) {
        self.transform = strip_scale(&transform);
    }

    /// Mass as seen by the solver: zero for static and kinematic bodies.
    #[must_use]
    pub fn mass(&self) -> f32 {
        match self.desc.category {
            DynamicsCategory::Dynamic => self.desc.mass,
            DynamicsCategory::Static | DynamicsCategory::Kinematic => 0.0,
        }
    }

    #[inline]
    #[must_use]
    pub fn linear_velocity(&self) -> Vec3 {
        self.desc.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.desc.linear_velocity = velocity;
    }

    #[inline]
    #[must_use]
    pub fn angular_velocity(&self) -> Vec3 {
        self.desc.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.desc.angular_velocity = velocity;
    }

    /// Scene node currently driving this body.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<NodeHandle> {
        self.owner
    }

    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Snapshot of the body state, with the current transform.
    #[must_use]
    pub fn desc(&self) -> RigidBodyDesc {
        RigidBodyDesc {
            transform: self.transform,
            ..self.desc.clone()
        }
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    /// Semi-implicit Euler step. Only dynamic bodies move.
    pub(crate) fn integrate(&mut self, dt: f32, gravity: Vec3) {
        if self.desc.category != DynamicsCategory::Dynamic {
            return;
        }

        self.desc.linear_velocity += gravity * dt;

        let (_, rotation, translation) = self.transform.to_scale_rotation_translation();
        let translation = translation + self.desc.linear_velocity * dt;
        let spin = Quat::from_scaled_axis(self.desc.angular_velocity * dt);
        let rotation = (spin * rotation).normalize();

        self.transform = Affine3A::from_rotation_translation(rotation, translation);
    }
}

fn strip_scale(transform: &Affine3A) -> Affine3A {
    let (_, rotation, translation) = transform.to_scale_rotation_translation();
    Affine3A::from_rotation_translation(rotation, translation)
}
