use std::cell::Cell;

use glam::{Affine3A, Quat, Vec3};

/// A local matrix paired with its inverse.
///
/// At most one side is authoritative at a time. The other side is flagged
/// stale and derived by inversion the first time it is read. The cells make
/// that read-time mutation explicit in the type.
#[derive(Debug, Clone)]
struct LocalMatrices {
    matrix: Cell<Affine3A>,
    inverse: Cell<Affine3A>,
    matrix_stale: Cell<bool>,
    inverse_stale: Cell<bool>,
}

impl LocalMatrices {
    fn new(matrix: Affine3A) -> Self {
        Self {
            matrix: Cell::new(matrix),
            inverse: Cell::new(Affine3A::IDENTITY),
            matrix_stale: Cell::new(false),
            inverse_stale: Cell::new(true),
        }
    }

    fn matrix(&self) -> Affine3A {
        if self.matrix_stale.get() {
            self.matrix.set(self.inverse.get().inverse());
            self.matrix_stale.set(false);
        }
        self.matrix.get()
    }

    fn inverse(&self) -> Affine3A {
        if self.inverse_stale.get() {
            self.inverse.set(self.matrix.get().inverse());
            self.inverse_stale.set(false);
        }
        self.inverse.get()
    }

    fn set_matrix(&mut self, matrix: Affine3A) {
        self.matrix.set(matrix);
        self.matrix_stale.set(false);
        self.inverse_stale.set(true);
    }

    fn set_inverse(&mut self, inverse: Affine3A) {
        self.inverse.set(inverse);
        self.inverse_stale.set(false);
        self.matrix_stale.set(true);
    }

    fn set_both(&mut self, matrix: Affine3A, inverse: Affine3A) {
        self.matrix.set(matrix);
        self.inverse.set(inverse);
        self.matrix_stale.set(false);
        self.inverse_stale.set(false);
    }
}

/// Transform data carried by transform-like nodes.
///
/// Holds the local matrix (relative to the parent frame), its inverse, and the
/// world-space caches written by the traversal.
///
/// # Staleness
///
/// `local_to_world` / `world_to_local` are only meaningful right after a
/// traversal that visited this node. Setters never touch them; they bump
/// `modified_count` instead, and the next traversal brings
/// `traversed_count` back in line.
#[derive(Debug, Clone)]
pub struct Transform {
    local: LocalMatrices,

    // === World caches (written by the traversal) ===
    pub(crate) local_to_world: Affine3A,
    pub(crate) world_to_local: Affine3A,

    // === Change tracking ===
    modified_count: u32,
    pub(crate) traversed_count: u32,

    absolute: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self::from_matrix(Affine3A::IDENTITY)
    }

    #[must_use]
    pub fn from_matrix(matrix: Affine3A) -> Self {
        Self {
            local: LocalMatrices::new(matrix),
            local_to_world: Affine3A::IDENTITY,
            world_to_local: Affine3A::IDENTITY,
            // One pending modification so the first traversal always computes.
            modified_count: 1,
            traversed_count: 0,
            absolute: false,
        }
    }

    /// A transform whose world matrix is its local matrix, ignoring ancestors.
    #[must_use]
    pub fn absolute(matrix: Affine3A) -> Self {
        let mut transform = Self::from_matrix(matrix);
        transform.absolute = true;
        transform
    }

    #[must_use]
    pub fn from_translation_rotation_scale(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self::from_matrix(Affine3A::from_scale_rotation_translation(
            scale,
            rotation,
            translation,
        ))
    }

    // ========================================================================
    // Local matrix
    // ========================================================================

    /// Local matrix, derived from the inverse first if the inverse is authoritative.
    #[inline]
    #[must_use]
    pub fn local_transform(&self) -> Affine3A {
        self.local.matrix()
    }

    /// Inverse local matrix, derived from the local matrix first if needed.
    #[inline]
    #[must_use]
    pub fn inverse_local_transform(&self) -> Affine3A {
        self.local.inverse()
    }

    /// Replaces the local matrix; the inverse becomes stale.
    pub fn set_local_transform(&mut self, matrix: Affine3A) {
        self.local.set_matrix(matrix);
        self.bump();
    }

    /// Replaces the inverse local matrix; the forward matrix becomes stale.
    pub fn set_inverse_local_transform(&mut self, inverse: Affine3A) {
        self.local.set_inverse(inverse);
        self.bump();
    }

    /// Sets both sides at once. The caller guarantees they are inverses.
    pub fn set_local_and_inverse(&mut self, matrix: Affine3A, inverse: Affine3A) {
        self.local.set_both(matrix, inverse);
        self.bump();
    }

    pub fn set_translation_rotation_scale(
        &mut self,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) {
        self.set_local_transform(Affine3A::from_scale_rotation_translation(
            scale,
            rotation,
            translation,
        ));
    }

    // ========================================================================
    // World caches
    // ========================================================================

    /// Cached local-to-world matrix from the last traversal that visited this node.
    #[inline]
    #[must_use]
    pub fn local_to_world(&self) -> &Affine3A {
        &self.local_to_world
    }

    /// Cached world-to-local matrix from the last traversal that visited this node.
    #[inline]
    #[must_use]
    pub fn world_to_local(&self) -> &Affine3A {
        &self.world_to_local
    }

    #[inline]
    #[must_use]
    pub fn modified_count(&self) -> u32 {
        self.modified_count
    }

    #[inline]
    #[must_use]
    pub fn traversed_count(&self) -> u32 {
        self.traversed_count
    }

    /// True when no local mutation happened since the last traversal of this node.
    #[inline]
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.traversed_count == self.modified_count
    }

    #[inline]
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Switches between ancestor composition and absolute placement.
    pub fn set_absolute(&mut self, absolute: bool) {
        if self.absolute != absolute {
            self.absolute = absolute;
            self.bump();
        }
    }

    // ========================================================================
    // Traversal hooks
    // ========================================================================

    /// Composes the world caches from the nearest ancestor's caches.
    pub(crate) fn compose(&mut self, ancestor: Option<(&Affine3A, &Affine3A)>) {
        let local = self.local.matrix();
        let inverse = self.local.inverse();
        match ancestor {
            Some((ancestor_to_world, world_to_ancestor)) => {
                self.local_to_world = *ancestor_to_world * local;
                self.world_to_local = inverse * *world_to_ancestor;
            }
            None => {
                self.local_to_world = local;
                self.world_to_local = inverse;
            }
        }
    }

    /// Stores a world matrix computed by a node-specific rule.
    pub(crate) fn set_world(&mut self, local_to_world: Affine3A) {
        self.local_to_world = local_to_world;
        self.world_to_local = local_to_world.inverse();
    }

    pub(crate) fn mark_traversed(&mut self) {
        self.traversed_count = self.modified_count;
    }

    fn bump(&mut self) {
        self.modified_count = self.modified_count.wrapping_add(1);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
