use crate::bounds::BoundingBox;
use crate::physics::RigidBodyTransform;
use crate::scene::skeleton::{Joint, Skeleton};
use crate::scene::transform::Transform;
use crate::scene::{NodeHandle, VisitMask};

/// Renderable or physically driven leaf.
///
/// Participates in traversal only as a consumer of the nearest ancestor's
/// world matrix: its local bounds are transformed and merged into the
/// traversal's running bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Entity {
    pub bounds: BoundingBox,
}

impl Entity {
    #[must_use]
    pub fn new(bounds: BoundingBox) -> Self {
        Self { bounds }
    }
}

/// The closed set of node kinds the traversal dispatches on.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Ordered collection of children, no transform.
    Group,
    /// Group carrying a local matrix.
    Transform(Transform),
    /// Transform contributing a skinning matrix.
    Joint(Joint),
    /// Owner of a root joint, traversed as an independent domain.
    Skeleton(Skeleton),
    /// Bounded leaf.
    Entity(Entity),
    /// Transform whose world matrix is exchanged with a rigid body.
    RigidBody(RigidBodyTransform),
}

/// A scene graph element.
///
/// # Hierarchy
///
/// - `parent`: non-owning back-reference, kept in sync by [`SceneGraph`](crate::scene::SceneGraph)
/// - `children`: owned children in traversal order (group-like kinds only)
///
/// A skeleton's root joint points back at the skeleton through `parent` but is
/// held in [`Skeleton::root_joint`] rather than in `children`.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) kind: NodeKind,

    /// Matched against the visitor's mask; a miss skips the whole subtree.
    pub accept_mask: VisitMask,

    // Set when the node is attached somewhere new or was last composed as a
    // traversal root below other transforms; forces a world refresh below it.
    pub(crate) hierarchy_changed: bool,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            kind,
            accept_mask: VisitMask::ALL,
            hierarchy_changed: false,
        }
    }

    #[must_use]
    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    #[must_use]
    pub fn transform(transform: Transform) -> Self {
        Self::new(NodeKind::Transform(transform))
    }

    #[must_use]
    pub fn joint(joint: Joint) -> Self {
        Self::new(NodeKind::Joint(joint))
    }

    #[must_use]
    pub fn skeleton() -> Self {
        Self::new(NodeKind::Skeleton(Skeleton::new()))
    }

    #[must_use]
    pub fn entity(bounds: BoundingBox) -> Self {
        Self::new(NodeKind::Entity(Entity::new(bounds)))
    }

    #[must_use]
    pub fn rigid_body(adapter: RigidBodyTransform) -> Self {
        Self::new(NodeKind::RigidBody(adapter))
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_accept_mask(mut self, mask: VisitMask) -> Self {
        self.accept_mask = mask;
        self
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this kind owns an ordered child collection.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Group | NodeKind::Transform(_) | NodeKind::Joint(_) | NodeKind::RigidBody(_)
        )
    }

    /// Whether this node contributes a bounding volume to traversal.
    #[must_use]
    pub fn has_bounds(&self) -> bool {
        matches!(self.kind, NodeKind::Entity(_))
    }

    /// Whether this node's world matrix ignores ancestor composition.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        match &self.kind {
            NodeKind::Transform(t) => t.is_absolute(),
            NodeKind::Joint(j) => j.transform.is_absolute(),
            NodeKind::RigidBody(_) => true,
            NodeKind::Group | NodeKind::Skeleton(_) | NodeKind::Entity(_) => false,
        }
    }

    // ========================================================================
    // Kind accessors
    // ========================================================================

    /// Transform data of transform, joint and rigid-body nodes.
    #[must_use]
    pub fn as_transform(&self) -> Option<&Transform> {
        match &self.kind {
            NodeKind::Transform(t) => Some(t),
            NodeKind::Joint(j) => Some(&j.transform),
            NodeKind::RigidBody(rb) => Some(&rb.transform),
            _ => None,
        }
    }

    /// Mutable transform data of transform and joint nodes.
    ///
    /// Rigid-body adapters are excluded: their matrix is owned by the
    /// physics exchange, not by local setters.
    #[must_use]
    pub fn as_transform_mut(&mut self) -> Option<&mut Transform> {
        match &mut self.kind {
            NodeKind::Transform(t) => Some(t),
            NodeKind::Joint(j) => Some(&mut j.transform),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_joint(&self) -> Option<&Joint> {
        match &self.kind {
            NodeKind::Joint(j) => Some(j),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_joint_mut(&mut self) -> Option<&mut Joint> {
        match &mut self.kind {
            NodeKind::Joint(j) => Some(j),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_skeleton(&self) -> Option<&Skeleton> {
        match &self.kind {
            NodeKind::Skeleton(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match &self.kind {
            NodeKind::Entity(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match &mut self.kind {
            NodeKind::Entity(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_rigid_body(&self) -> Option<&RigidBodyTransform> {
        match &self.kind {
            NodeKind::RigidBody(rb) => Some(rb),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_rigid_body_mut(&mut self) -> Option<&mut RigidBodyTransform> {
        match &mut self.kind {
            NodeKind::RigidBody(rb) => Some(rb),
            _ => None,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::group()
    }
}
