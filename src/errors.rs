//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`SpatialError`] covers structural-invariant violations of
//! the scene graph:
//! - Parent/child bookkeeping (adding an owned node, removing from the wrong owner)
//! - Operations applied to a node of the wrong kind
//! - Skeleton and rigid-body attachment rules
//!
//! Reading a cached world matrix that has not been refreshed by a traversal is
//! *not* an error; the last computed value is returned.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, SpatialError>`.
//!
//! ```rust,ignore
//! use myth_spatial::errors::{SpatialError, Result};
//!
//! fn rebuild(graph: &mut SceneGraph, parent: NodeHandle, child: NodeHandle) -> Result<()> {
//!     graph.add_child(parent, child)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::scene::NodeHandle;

/// The main error type for the spatial graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpatialError {
    // ========================================================================
    // Hierarchy Errors
    // ========================================================================
    /// The handle does not refer to a live node.
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeHandle),

    /// The node already has an owner and must be removed from it first.
    #[error("Node {child:?} already has parent {parent:?}")]
    AlreadyParented {
        /// The node that was being attached
        child: NodeHandle,
        /// Its current owner
        parent: NodeHandle,
    },

    /// The node is not owned by the group it was removed from.
    #[error("Node {child:?} is not a child of {group:?}")]
    NotChildOf {
        /// The node that was being removed
        child: NodeHandle,
        /// The group it was expected to belong to
        group: NodeHandle,
    },

    /// Attaching the node would make it its own ancestor.
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// The node that was being attached
        child: NodeHandle,
        /// The intended owner
        parent: NodeHandle,
    },

    // ========================================================================
    // Node Kind Errors
    // ========================================================================
    /// The node cannot own children.
    #[error("Node {0:?} cannot own children")]
    NotAGroup(NodeHandle),

    /// The node carries no local transform.
    #[error("Node {0:?} is not a transform")]
    NotATransform(NodeHandle),

    /// The node is not a joint.
    #[error("Node {0:?} is not a joint")]
    NotAJoint(NodeHandle),

    /// The node is not a skeleton.
    #[error("Node {0:?} is not a skeleton")]
    NotASkeleton(NodeHandle),

    /// The node is not a physics adapter.
    #[error("Node {0:?} is not a rigid body transform")]
    NotARigidBodyTransform(NodeHandle),

    // ========================================================================
    // Skeleton & Physics Errors
    // ========================================================================
    /// Inverse bind matrices are immutable once the owning skeleton is finalized.
    #[error("Skeleton owning {0:?} is already finalized")]
    SkeletonFinalized(NodeHandle),

    /// The rigid body is already driven by another scene node.
    #[error("Rigid body '{body}' is already attached to {owner:?}")]
    RigidBodyAlreadyAttached {
        /// Name of the rigid body
        body: String,
        /// The node currently driving it
        owner: NodeHandle,
    },
}

/// Alias for `Result<T, SpatialError>`.
pub type Result<T> = std::result::Result<T, SpatialError>;
