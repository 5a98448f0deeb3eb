use glam::{Affine3A, Mat4, Quat, Vec3};

use crate::scene::NodeHandle;
use crate::scene::transform::Transform;

/// A transform that also deforms mesh vertices bound to it.
///
/// `skinning_matrix = local_to_world * inverse_bind_matrix`, where
/// `local_to_world` is expressed in the owning skeleton's frame.
#[derive(Debug, Clone)]
pub struct Joint {
    pub transform: Transform,

    // Static data: constant once the owning skeleton is finalized
    pub(crate) inverse_bind_matrix: Affine3A,
    pub(crate) explicit_bind: bool,
    pub(crate) finalized: bool,
    pub(crate) index: Option<usize>,

    // Runtime data, refreshed together with `local_to_world`
    pub(crate) skinning_matrix: Affine3A,
}

impl Joint {
    #[must_use]
    pub fn new() -> Self {
        Self::from_matrix(Affine3A::IDENTITY)
    }

    #[must_use]
    pub fn from_matrix(matrix: Affine3A) -> Self {
        Self {
            transform: Transform::from_matrix(matrix),
            inverse_bind_matrix: Affine3A::IDENTITY,
            explicit_bind: false,
            finalized: false,
            index: None,
            skinning_matrix: Affine3A::IDENTITY,
        }
    }

    /// Builds a joint whose inverse bind matrix is supplied by the loader
    /// instead of being derived from the bind pose at finalization.
    #[must_use]
    pub fn with_inverse_bind_matrix(matrix: Affine3A, inverse_bind_matrix: Affine3A) -> Self {
        let mut joint = Self::from_matrix(matrix);
        joint.inverse_bind_matrix = inverse_bind_matrix;
        joint.explicit_bind = true;
        joint
    }

    /// Sets the local matrix from a rigid rotation and translation.
    pub fn set_rotation_translation(&mut self, rotation: Quat, translation: Vec3) {
        self.transform
            .set_local_transform(Affine3A::from_rotation_translation(rotation, translation));
    }

    /// Sets the inverse local matrix from a rigid rotation and translation.
    pub fn set_inverse_rotation_translation(&mut self, rotation: Quat, translation: Vec3) {
        let inverse = Affine3A::from_rotation_translation(rotation, translation);
        self.transform.set_inverse_local_transform(inverse);
    }

    #[inline]
    #[must_use]
    pub fn inverse_bind_matrix(&self) -> &Affine3A {
        &self.inverse_bind_matrix
    }

    #[inline]
    #[must_use]
    pub fn skinning_matrix(&self) -> &Affine3A {
        &self.skinning_matrix
    }

    /// Position of this joint in the skeleton's skinning palette, once finalized.
    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn update_skinning(&mut self) {
        self.skinning_matrix = self.transform.local_to_world * self.inverse_bind_matrix;
    }

    /// Freezes the bind data. Derives the inverse bind matrix from the current
    /// (bind-pose) world matrix unless one was supplied explicitly.
    pub(crate) fn finalize(&mut self, index: usize) {
        if !self.explicit_bind {
            self.inverse_bind_matrix = self.transform.world_to_local;
        }
        self.index = Some(index);
        self.finalized = true;
        self.update_skinning();
    }

    /// Undoes `finalize` when the joint leaves its skeleton. An explicitly
    /// supplied inverse bind matrix is kept.
    pub(crate) fn release(&mut self) {
        self.index = None;
        self.finalized = false;
    }
}

impl Default for Joint {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of a joint hierarchy.
///
/// The skeleton has no transform of its own. Its root joint is traversed as an
/// independent domain, so joint matrices live in the skeleton's frame and do
/// not depend on where the skeleton node is attached.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub(crate) root_joint: Option<NodeHandle>,
    pub(crate) finalized: bool,
    /// Joints ordered by palette index, filled at finalization.
    pub(crate) joints: Vec<NodeHandle>,
}

impl Skeleton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn root_joint(&self) -> Option<NodeHandle> {
        self.root_joint
    }

    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Joints in palette order; empty until the skeleton is finalized.
    #[inline]
    #[must_use]
    pub fn joints(&self) -> &[NodeHandle] {
        &self.joints
    }
}

/// Converts skinning matrices to the column-major layout uploaded to the GPU.
#[must_use]
pub fn to_gpu_palette(matrices: &[Affine3A]) -> Vec<Mat4> {
    matrices.iter().map(|m| Mat4::from(*m)).collect()
}
