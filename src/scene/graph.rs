//! Scene graph arena
//!
//! [`SceneGraph`] owns every node in a `SlotMap` and is the only place where
//! parent/child links change. Each structural operation validates all of its
//! preconditions before touching anything, so a failed call leaves the graph
//! exactly as it was.

use glam::{Affine3A, Mat4};
use slotmap::SlotMap;

use crate::bounds::BoundingBox;
use crate::errors::{Result, SpatialError};
use crate::physics::{DynamicsCategory, RigidBodyTransform, SharedRigidBody};
use crate::scene::node::{Node, NodeKind};
use crate::scene::skeleton::{Joint, to_gpu_palette};
use crate::scene::transform::Transform;
use crate::scene::traverse::TraverseVisitor;
use crate::scene::NodeHandle;

/// Reports a precondition violation on the log before handing it back.
fn violation(err: SpatialError) -> SpatialError {
    log::error!("Scene graph precondition violated: {err}");
    err
}

/// Owner of all nodes of one spatial hierarchy.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeHandle, Node>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Takes ownership of a detached node.
    pub fn insert(&mut self, node: Node) -> NodeHandle {
        self.nodes.insert(node)
    }

    pub fn create_group(&mut self) -> NodeHandle {
        self.insert(Node::group())
    }

    pub fn create_transform(&mut self, matrix: Affine3A) -> NodeHandle {
        self.insert(Node::transform(Transform::from_matrix(matrix)))
    }

    pub fn create_joint(&mut self, joint: Joint) -> NodeHandle {
        self.insert(Node::joint(joint))
    }

    pub fn create_skeleton(&mut self) -> NodeHandle {
        self.insert(Node::skeleton())
    }

    pub fn create_entity(&mut self, bounds: BoundingBox) -> NodeHandle {
        self.insert(Node::entity(bounds))
    }

    /// Creates a physics adapter, optionally attached to `body` right away.
    pub fn create_rigid_body_transform(
        &mut self,
        adapter: RigidBodyTransform,
        body: Option<SharedRigidBody>,
    ) -> Result<NodeHandle> {
        let handle = self.insert(Node::rigid_body(adapter));
        if let Some(body) = body
            && let Err(err) = self.attach_rigid_body(handle, body)
        {
            self.nodes.remove(handle);
            return Err(err);
        }
        Ok(handle)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    #[inline]
    #[must_use]
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut SlotMap<NodeHandle, Node> {
        &mut self.nodes
    }

    fn node(&self, handle: NodeHandle) -> Result<&Node> {
        self.nodes
            .get(handle)
            .ok_or_else(|| violation(SpatialError::NodeNotFound(handle)))
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        match self.nodes.get_mut(handle) {
            Some(node) => Ok(node),
            None => Err(violation(SpatialError::NodeNotFound(handle))),
        }
    }

    /// True if `ancestor` lies on the parent chain of `node` (or is `node`).
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.nodes.get(handle).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order, insertion-order list of `root` and everything it owns,
    /// including skeleton root joints.
    pub fn subtree(&self, root: NodeHandle) -> Result<Vec<NodeHandle>> {
        self.node(root)?;

        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            out.push(handle);
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
            if let NodeKind::Skeleton(skeleton) = &node.kind
                && let Some(joint) = skeleton.root_joint
            {
                stack.push(joint);
            }
        }
        Ok(out)
    }

    /// Depth-first search for the first node named `name` under `root`.
    #[must_use]
    pub fn find_named_node(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.subtree(root)
            .ok()?
            .into_iter()
            .find(|&h| self.nodes.get(h).and_then(Node::name) == Some(name))
    }

    // ========================================================================
    // Hierarchy editing
    // ========================================================================

    fn check_attachable(&self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;

        if !parent_node.is_group() {
            return Err(violation(SpatialError::NotAGroup(parent)));
        }
        if let Some(owner) = child_node.parent {
            return Err(violation(SpatialError::AlreadyParented {
                child,
                parent: owner,
            }));
        }
        if self.is_ancestor(child, parent) {
            return Err(violation(SpatialError::CycleDetected { child, parent }));
        }
        Ok(())
    }

    fn child_position(&self, group: NodeHandle, child: NodeHandle) -> Result<usize> {
        let group_node = self.node(group)?;
        let child_node = self.node(child)?;
        if child_node.parent != Some(group) {
            return Err(violation(SpatialError::NotChildOf { child, group }));
        }
        group_node
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| violation(SpatialError::NotChildOf { child, group }))
    }

    /// Appends `child` to `parent`'s children.
    ///
    /// Fails if `child` already has an owner, if `parent` cannot own children,
    /// or if `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        self.check_attachable(parent, child)?;
        self.link(parent, child);
        log::debug!("Attached {child:?} to {parent:?}");
        Ok(())
    }

    /// Detaches `child` from `group`.
    ///
    /// Removal swaps the last child into the freed slot; sibling order is not
    /// preserved.
    pub fn remove_child(&mut self, group: NodeHandle, child: NodeHandle) -> Result<()> {
        let index = self.child_position(group, child)?;
        self.unlink(group, child, index);
        log::debug!("Detached {child:?} from {group:?}");
        Ok(())
    }

    /// Moves `child` from `from` to the end of `to` in one step.
    ///
    /// Every precondition of the removal and the insertion is checked before
    /// either happens, so `child` is never observed without an owner.
    pub fn move_child(
        &mut self,
        from: NodeHandle,
        to: NodeHandle,
        child: NodeHandle,
    ) -> Result<()> {
        let index = self.child_position(from, child)?;
        let target = self.node(to)?;
        if !target.is_group() {
            return Err(violation(SpatialError::NotAGroup(to)));
        }
        if self.is_ancestor(child, to) {
            return Err(violation(SpatialError::CycleDetected { child, parent: to }));
        }

        self.unlink(from, child, index);
        self.link(to, child);
        log::debug!("Moved {child:?} from {from:?} to {to:?}");
        Ok(())
    }

    /// Puts `new_child` in the slot held by `child`, which becomes detached.
    pub fn replace_child(
        &mut self,
        group: NodeHandle,
        child: NodeHandle,
        new_child: NodeHandle,
    ) -> Result<()> {
        let index = self.child_position(group, child)?;
        let new_node = self.node(new_child)?;
        if let Some(owner) = new_node.parent {
            return Err(violation(SpatialError::AlreadyParented {
                child: new_child,
                parent: owner,
            }));
        }
        if self.is_ancestor(new_child, group) {
            return Err(violation(SpatialError::CycleDetected {
                child: new_child,
                parent: group,
            }));
        }

        self.nodes[group].children[index] = new_child;
        self.nodes[child].parent = None;
        let new_node = &mut self.nodes[new_child];
        new_node.parent = Some(group);
        new_node.hierarchy_changed = true;
        log::debug!("Replaced {child:?} with {new_child:?} under {group:?}");
        Ok(())
    }

    /// Destroys `handle` and everything it owns.
    ///
    /// The node is first detached from its owner; rigid bodies held by
    /// destroyed adapters are released and lose their back-reference.
    /// Returns the number of nodes destroyed.
    pub fn destroy(&mut self, handle: NodeHandle) -> Result<usize> {
        let parent = self.node(handle)?.parent;

        if let Some(parent) = parent {
            let is_root_joint = matches!(
                &self.nodes[parent].kind,
                NodeKind::Skeleton(skeleton) if skeleton.root_joint == Some(handle)
            );
            if is_root_joint {
                self.take_root_joint(parent)?;
            } else {
                let index = self.child_position(parent, handle)?;
                self.unlink(parent, handle, index);
            }
        }

        let mut destroyed = 0;
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(mut node) = self.nodes.remove(current) else {
                continue;
            };
            stack.extend(node.children.drain(..));
            match &mut node.kind {
                NodeKind::Skeleton(skeleton) => stack.extend(skeleton.root_joint.take()),
                NodeKind::RigidBody(adapter) => {
                    adapter.detach();
                }
                _ => {}
            }
            destroyed += 1;
        }

        log::debug!("Destroyed {destroyed} node(s) rooted at {handle:?}");
        Ok(destroyed)
    }

    fn link(&mut self, parent: NodeHandle, child: NodeHandle) {
        self.nodes[parent].children.push(child);
        let child_node = &mut self.nodes[child];
        child_node.parent = Some(parent);
        child_node.hierarchy_changed = true;
    }

    fn unlink(&mut self, group: NodeHandle, child: NodeHandle, index: usize) {
        self.nodes[group].children.swap_remove(index);
        self.nodes[child].parent = None;
    }

    // ========================================================================
    // Skeletons
    // ========================================================================

    /// Installs `joint` as the root of `skeleton`.
    ///
    /// The previous root, if any, is released (detached, not destroyed) and
    /// returned. Replacing the root resets the skeleton's finalization.
    pub fn set_root_joint(
        &mut self,
        skeleton: NodeHandle,
        joint: NodeHandle,
    ) -> Result<Option<NodeHandle>> {
        let skeleton_node = self.node(skeleton)?;
        if skeleton_node.as_skeleton().is_none() {
            return Err(violation(SpatialError::NotASkeleton(skeleton)));
        }
        let joint_node = self.node(joint)?;
        if joint_node.as_joint().is_none() {
            return Err(violation(SpatialError::NotAJoint(joint)));
        }
        if let Some(owner) = joint_node.parent {
            return Err(violation(SpatialError::AlreadyParented {
                child: joint,
                parent: owner,
            }));
        }
        if self.is_ancestor(joint, skeleton) {
            return Err(violation(SpatialError::CycleDetected {
                child: joint,
                parent: skeleton,
            }));
        }

        let previous = self.take_root_joint(skeleton)?;

        if let NodeKind::Skeleton(s) = &mut self.nodes[skeleton].kind {
            s.root_joint = Some(joint);
        }
        let joint_node = &mut self.nodes[joint];
        joint_node.parent = Some(skeleton);
        joint_node.hierarchy_changed = true;

        log::debug!("Skeleton {skeleton:?} root joint set to {joint:?}");
        Ok(previous)
    }

    /// Detaches and returns the root joint of `skeleton`.
    ///
    /// The released joints lose their palette index and accept a new inverse
    /// bind matrix, ready to be finalized by another skeleton.
    pub fn take_root_joint(&mut self, skeleton: NodeHandle) -> Result<Option<NodeHandle>> {
        let NodeKind::Skeleton(s) = &mut self.node_mut(skeleton)?.kind else {
            return Err(violation(SpatialError::NotASkeleton(skeleton)));
        };
        let previous = s.root_joint.take();
        if previous.is_some() {
            s.finalized = false;
            s.joints.clear();
        }
        if let Some(old) = previous
            && let Some(old_node) = self.nodes.get_mut(old)
        {
            old_node.parent = None;
            for handle in self.subtree(old)? {
                if let Some(joint) = self.nodes[handle].as_joint_mut() {
                    joint.release();
                }
            }
            log::debug!("Released root joint {old:?} from skeleton {skeleton:?}");
        }
        Ok(previous)
    }

    /// Freezes the skeleton's bind pose.
    ///
    /// Traverses the joint hierarchy in the skeleton's frame, assigns palette
    /// indices in depth-first order and derives the inverse bind matrix of
    /// every joint that was not given one explicitly. Returns the joint count.
    pub fn finalize_skeleton(&mut self, skeleton: NodeHandle) -> Result<usize> {
        let s = self
            .node(skeleton)?
            .as_skeleton()
            .ok_or_else(|| violation(SpatialError::NotASkeleton(skeleton)))?;
        if s.finalized {
            return Err(violation(SpatialError::SkeletonFinalized(skeleton)));
        }
        let Some(root) = s.root_joint else {
            return Ok(0);
        };

        TraverseVisitor::new().traverse(self, root);

        let joints: Vec<NodeHandle> = self
            .subtree(root)?
            .into_iter()
            .filter(|&h| self.nodes.get(h).is_some_and(|n| n.as_joint().is_some()))
            .collect();

        for (index, &handle) in joints.iter().enumerate() {
            if let Some(joint) = self.nodes[handle].as_joint_mut() {
                joint.finalize(index);
            }
        }

        let count = joints.len();
        if let NodeKind::Skeleton(s) = &mut self.nodes[skeleton].kind {
            s.joints = joints;
            s.finalized = true;
        }
        log::debug!("Finalized skeleton {skeleton:?} with {count} joint(s)");
        Ok(count)
    }

    /// Supplies a joint's inverse bind matrix. Only allowed before the owning
    /// skeleton is finalized.
    pub fn set_inverse_bind_matrix(&mut self, joint: NodeHandle, matrix: Affine3A) -> Result<()> {
        let Some(j) = self.node_mut(joint)?.as_joint_mut() else {
            return Err(violation(SpatialError::NotAJoint(joint)));
        };
        if j.finalized {
            return Err(violation(SpatialError::SkeletonFinalized(joint)));
        }
        j.inverse_bind_matrix = matrix;
        j.explicit_bind = true;
        Ok(())
    }

    /// Skinning matrices in palette order. Empty until finalized.
    pub fn skinning_matrices(&self, skeleton: NodeHandle) -> Result<Vec<Affine3A>> {
        let s = self
            .node(skeleton)?
            .as_skeleton()
            .ok_or_else(|| violation(SpatialError::NotASkeleton(skeleton)))?;
        Ok(s.joints
            .iter()
            .filter_map(|&h| self.nodes.get(h).and_then(Node::as_joint))
            .map(|j| j.skinning_matrix)
            .collect())
    }

    /// Skinning palette laid out for GPU upload.
    pub fn skinning_palette(&self, skeleton: NodeHandle) -> Result<Vec<Mat4>> {
        Ok(to_gpu_palette(&self.skinning_matrices(skeleton)?))
    }

    // ========================================================================
    // Per-node transform accessors
    // ========================================================================

    fn transform_of(&self, handle: NodeHandle) -> Option<&Transform> {
        self.nodes.get(handle).and_then(Node::as_transform)
    }

    fn transform_mut_of(&mut self, handle: NodeHandle) -> Result<&mut Transform> {
        match self.node_mut(handle)?.as_transform_mut() {
            Some(transform) => Ok(transform),
            None => Err(violation(SpatialError::NotATransform(handle))),
        }
    }

    /// Cached world matrix. Only valid after a traversal covering `handle`.
    #[must_use]
    pub fn local_to_world(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.transform_of(handle).map(|t| t.local_to_world)
    }

    /// Cached inverse world matrix. Only valid after a traversal covering `handle`.
    #[must_use]
    pub fn world_to_local(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.transform_of(handle).map(|t| t.world_to_local)
    }

    #[must_use]
    pub fn local_transform(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.transform_of(handle).map(Transform::local_transform)
    }

    #[must_use]
    pub fn inverse_local_transform(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.transform_of(handle).map(Transform::inverse_local_transform)
    }

    pub fn set_local_transform(&mut self, handle: NodeHandle, matrix: Affine3A) -> Result<()> {
        self.transform_mut_of(handle)?.set_local_transform(matrix);
        Ok(())
    }

    pub fn set_inverse_local_transform(
        &mut self,
        handle: NodeHandle,
        inverse: Affine3A,
    ) -> Result<()> {
        self.transform_mut_of(handle)?.set_inverse_local_transform(inverse);
        Ok(())
    }

    #[must_use]
    pub fn modified_count(&self, handle: NodeHandle) -> Option<u32> {
        self.transform_of(handle).map(Transform::modified_count)
    }

    #[must_use]
    pub fn traversed_count(&self, handle: NodeHandle) -> Option<u32> {
        self.transform_of(handle).map(Transform::traversed_count)
    }

    #[must_use]
    pub fn skinning_matrix(&self, joint: NodeHandle) -> Option<Affine3A> {
        self.nodes
            .get(joint)
            .and_then(Node::as_joint)
            .map(|j| j.skinning_matrix)
    }

    // ========================================================================
    // Physics adapters
    // ========================================================================

    /// Attaches `body` to the adapter at `handle`, replacing (and releasing)
    /// any previously attached body, which is returned.
    pub fn attach_rigid_body(
        &mut self,
        handle: NodeHandle,
        body: SharedRigidBody,
    ) -> Result<Option<SharedRigidBody>> {
        let Some(adapter) = self.node_mut(handle)?.as_rigid_body_mut() else {
            return Err(violation(SpatialError::NotARigidBodyTransform(handle)));
        };
        let previous = adapter.attach(body, handle).map_err(violation)?;
        log::debug!("Attached rigid body to {handle:?}");
        Ok(previous)
    }

    /// Releases the body driving the adapter at `handle`.
    pub fn detach_rigid_body(&mut self, handle: NodeHandle) -> Result<Option<SharedRigidBody>> {
        let Some(adapter) = self.node_mut(handle)?.as_rigid_body_mut() else {
            return Err(violation(SpatialError::NotARigidBodyTransform(handle)));
        };
        let previous = adapter.detach();
        if previous.is_some() {
            log::debug!("Detached rigid body from {handle:?}");
        }
        Ok(previous)
    }

    /// Category of the body driving the adapter at `handle`. Lags a physics-side
    /// removal until the adapter is traversed again.
    #[must_use]
    pub fn dynamics_category(&self, handle: NodeHandle) -> Option<DynamicsCategory> {
        self.nodes
            .get(handle)
            .and_then(Node::as_rigid_body)
            .and_then(RigidBodyTransform::dynamics_category)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Refreshes the world matrices under `root` and returns the merged
    /// world bounds of the entities visited.
    pub fn traverse(&mut self, root: NodeHandle) -> BoundingBox {
        TraverseVisitor::new().traverse(self, root).bounds
    }
}

impl Drop for SceneGraph {
    fn drop(&mut self) {
        // Bodies may outlive the graph on the physics side.
        for node in self.nodes.values_mut() {
            if let NodeKind::RigidBody(adapter) = &mut node.kind {
                adapter.detach();
            }
        }
    }
}
