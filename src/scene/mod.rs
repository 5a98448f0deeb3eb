//! Scene graph module
//!
//! Maintains the spatial hierarchy and its cached matrices:
//! - [`Node`]: hierarchy element tagged with a [`NodeKind`]
//! - [`Transform`]: local matrix, lazily derived inverse, world-space caches
//! - [`Joint`] / [`Skeleton`]: skinning hierarchy traversed in its own frame
//! - [`SceneGraph`]: arena owning every node and enforcing parent/child rules
//! - [`TraverseVisitor`]: refreshes dirty world matrices and merges entity bounds

pub mod graph;
pub mod node;
pub mod skeleton;
pub mod transform;
pub mod traverse;

pub use graph::SceneGraph;
pub use node::{Entity, Node, NodeKind};
pub use skeleton::{Joint, Skeleton};
pub use transform::Transform;
pub use traverse::{Traversal, TraverseVisitor, traverse};

use bitflags::bitflags;
use slotmap::new_key_type;

new_key_type! {
    /// Stable identity of a node inside a [`SceneGraph`].
    pub struct NodeHandle;
}

bitflags! {
    /// Selects which nodes a traversal descends into.
    ///
    /// A node is visited when `node.accept_mask & visitor.visit_mask` is non-empty.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct VisitMask: u32 {
        const RENDER  = 1 << 0;
        const PHYSICS = 1 << 1;
        const DEBUG   = 1 << 2;
        const ALL     = u32::MAX;
    }
}

impl Default for VisitMask {
    fn default() -> Self {
        Self::ALL
    }
}
