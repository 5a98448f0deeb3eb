//! Traversal & Physics Configuration
//!
//! Plain configuration structs with sensible defaults. Override individual
//! fields with struct update syntax:
//!
//! ```rust,ignore
//! use myth_spatial::settings::TraversalSettings;
//! use myth_spatial::scene::VisitMask;
//!
//! let settings = TraversalSettings {
//!     visit_mask: VisitMask::RENDER,
//!     ..Default::default()
//! };
//! let mut visitor = TraverseVisitor::with_settings(settings);
//! ```

use glam::Vec3;

use crate::scene::VisitMask;

// ---------------------------------------------------------------------------
// TraversalSettings
// ---------------------------------------------------------------------------

/// Configuration consumed by [`TraverseVisitor`](crate::scene::TraverseVisitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalSettings {
    /// Nodes whose accept mask does not intersect this mask are skipped
    /// together with their subtree.
    pub visit_mask: VisitMask,
    /// Initial capacity reserved for the per-call work list.
    pub work_list_capacity: usize,
    /// Whether visited entities are recorded in the traversal output.
    pub collect_entities: bool,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            visit_mask: VisitMask::ALL,
            work_list_capacity: 64,
            collect_entities: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PhysicsSettings
// ---------------------------------------------------------------------------

/// Configuration consumed by [`DynamicsWorld`](crate::physics::DynamicsWorld).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsSettings {
    /// Constant acceleration applied to dynamic bodies.
    pub gravity: Vec3,
    /// Longest time slice integrated in one substep, in seconds.
    /// A `step(dt)` larger than this is split into equal substeps.
    pub max_substep: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            max_substep: 1.0 / 60.0,
        }
    }
}
