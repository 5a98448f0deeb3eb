//! Traversal (world-matrix refresh)
//!
//! Walks a subtree with an explicit work list, so deep hierarchies never grow
//! the call stack. Each work item carries the nearest ancestor transform's
//! world matrices and whether that ancestor was recomputed during this call.
//!
//! # Dirty propagation
//!
//! A transform is recomputed when its own local matrix changed since its last
//! visit, when its nearest ancestor was recomputed in this call, or when it
//! was re-parented. Absolute transforms (physics adapters, camera roots) are
//! recomputed on every visit. A recompute forces every visited descendant to
//! recompute as well.
//!
//! # Precondition
//!
//! Only visited nodes are refreshed. A node outside the traversed subtree
//! keeps the caches of its last visit, and two nodes refreshed by different
//! calls may transiently disagree. Callers must traverse before reading.
//!
//! Traversing a sub-root composes its subtree from that sub-root, ignoring the
//! transforms above it. The sub-root is then left flagged, so the next
//! traversal that reaches it from further up recomposes the whole subtree.
//! Use [`TraverseVisitor::traverse_subtree`] to refresh a sub-root in its
//! scene frame instead.

use glam::Affine3A;

use crate::bounds::BoundingBox;
use crate::scene::graph::SceneGraph;
use crate::scene::node::NodeKind;
use crate::scene::transform::Transform;
use crate::scene::NodeHandle;
use crate::settings::TraversalSettings;

/// World matrices of the nearest ancestor transform.
#[derive(Debug, Clone, Copy)]
struct Frame {
    local_to_world: Affine3A,
    world_to_local: Affine3A,
}

impl Frame {
    fn of(transform: &Transform) -> Self {
        Self {
            local_to_world: transform.local_to_world,
            world_to_local: transform.world_to_local,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    node: NodeHandle,
    ancestor: Option<Frame>,
    ancestor_recomputed: bool,
}

/// What to do after a node has been processed.
enum Step {
    /// Push the children with this frame as their nearest ancestor.
    Descend {
        frame: Option<Frame>,
        recomputed: bool,
    },
    /// Run an independent traversal rooted at this joint.
    Skeleton(Option<NodeHandle>),
    Leaf,
}

/// Result of one traversal call.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// Merged world bounds of every entity visited outside skeletons.
    pub bounds: BoundingBox,
    /// Entities visited outside skeletons, in visit order.
    pub entities: Vec<NodeHandle>,
    pub visited_nodes: usize,
    /// Transform-like nodes whose world caches were rewritten.
    pub recomputed_transforms: usize,
}

/// Refreshes cached world matrices and merges entity bounds.
///
/// Holds configuration only; the work list is local to each call, so one
/// visitor can serve any number of graphs.
#[derive(Debug, Clone, Default)]
pub struct TraverseVisitor {
    settings: TraversalSettings,
}

impl TraverseVisitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: TraversalSettings) -> Self {
        Self { settings }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &TraversalSettings {
        &self.settings
    }

    /// Traverses from `root`, treating it as the composition origin.
    pub fn traverse(&self, graph: &mut SceneGraph, root: NodeHandle) -> Traversal {
        let mut out = Traversal::default();
        self.walk(graph, root, None, false, true, &mut out);

        // The subtree was composed without its ancestors. Leave it dirty so the
        // next traversal reaching it through them recomposes it.
        if nearest_ancestor_frame(graph, root).is_some()
            && let Some(node) = graph.nodes_mut().get_mut(root)
        {
            node.hierarchy_changed = true;
        }

        log::trace!(
            "Traversed {root:?}: {} visited, {} recomputed, {} entities",
            out.visited_nodes,
            out.recomputed_transforms,
            out.entities.len()
        );
        out
    }

    /// Traverses from `root`, composing with the cached matrices of its
    /// nearest ancestor transform instead of starting from identity.
    ///
    /// Every transform in the subtree is recomputed. The ancestor caches are
    /// taken as they are: they must be up to date for the result to be.
    pub fn traverse_subtree(&self, graph: &mut SceneGraph, root: NodeHandle) -> Traversal {
        let ancestor = nearest_ancestor_frame(graph, root);
        let mut out = Traversal::default();
        self.walk(graph, root, ancestor, true, true, &mut out);
        log::trace!(
            "Traversed subtree {root:?}: {} visited, {} recomputed",
            out.visited_nodes,
            out.recomputed_transforms
        );
        out
    }

    fn walk(
        &self,
        graph: &mut SceneGraph,
        root: NodeHandle,
        ancestor: Option<Frame>,
        ancestor_recomputed: bool,
        record_entities: bool,
        out: &mut Traversal,
    ) {
        let mut work: Vec<WorkItem> = Vec::with_capacity(self.settings.work_list_capacity);
        work.push(WorkItem {
            node: root,
            ancestor,
            ancestor_recomputed,
        });

        while let Some(item) = work.pop() {
            let Some(node) = graph.nodes_mut().get_mut(item.node) else {
                continue;
            };
            if !node.accept_mask.intersects(self.settings.visit_mask) {
                continue;
            }
            out.visited_nodes += 1;

            let forced = item.ancestor_recomputed || std::mem::take(&mut node.hierarchy_changed);
            let ancestor = item
                .ancestor
                .as_ref()
                .map(|f| (&f.local_to_world, &f.world_to_local));

            let step = match &mut node.kind {
                NodeKind::Group => Step::Descend {
                    frame: item.ancestor,
                    recomputed: forced,
                },
                NodeKind::Transform(transform) => {
                    let recomputed = refresh(transform, ancestor, forced);
                    Step::Descend {
                        frame: Some(Frame::of(transform)),
                        recomputed,
                    }
                }
                NodeKind::Joint(joint) => {
                    let recomputed = refresh(&mut joint.transform, ancestor, forced);
                    if recomputed {
                        joint.update_skinning();
                    }
                    Step::Descend {
                        frame: Some(Frame::of(&joint.transform)),
                        recomputed,
                    }
                }
                NodeKind::RigidBody(adapter) => {
                    adapter.exchange(item.ancestor.as_ref().map(|f| &f.local_to_world));
                    adapter.transform.mark_traversed();
                    Step::Descend {
                        frame: Some(Frame::of(&adapter.transform)),
                        recomputed: true,
                    }
                }
                NodeKind::Skeleton(skeleton) => Step::Skeleton(skeleton.root_joint),
                NodeKind::Entity(entity) => {
                    if record_entities {
                        let to_world = item
                            .ancestor
                            .map_or(Affine3A::IDENTITY, |f| f.local_to_world);
                        out.bounds.merge(&entity.bounds.transform(&to_world));
                        if self.settings.collect_entities {
                            out.entities.push(item.node);
                        }
                    }
                    Step::Leaf
                }
            };

            match step {
                Step::Descend { frame, recomputed } => {
                    let transform_like = matches!(
                        node.kind,
                        NodeKind::Transform(_) | NodeKind::Joint(_) | NodeKind::RigidBody(_)
                    );
                    if transform_like && recomputed {
                        out.recomputed_transforms += 1;
                    }
                    // Reverse push keeps insertion order on pop.
                    for &child in node.children.iter().rev() {
                        work.push(WorkItem {
                            node: child,
                            ancestor: frame,
                            ancestor_recomputed: recomputed,
                        });
                    }
                }
                Step::Skeleton(Some(joint)) => {
                    // Joint space is the skeleton's own frame: no ancestor, and
                    // the sub-traversal completes before the walk moves on. It
                    // runs with default settings, so the outer visit mask does
                    // not prune joints.
                    TraverseVisitor::default().walk(graph, joint, None, false, false, out);
                }
                Step::Skeleton(None) | Step::Leaf => {}
            }
        }
    }
}

/// Recomputes `transform` when needed and marks it traversed.
/// Returns whether its world caches were rewritten.
fn refresh(
    transform: &mut Transform,
    ancestor: Option<(&Affine3A, &Affine3A)>,
    forced: bool,
) -> bool {
    let recomputed = if transform.is_absolute() {
        transform.compose(None);
        true
    } else if forced || !transform.is_up_to_date() {
        transform.compose(ancestor);
        true
    } else {
        false
    };
    transform.mark_traversed();
    recomputed
}

fn nearest_ancestor_frame(graph: &SceneGraph, handle: NodeHandle) -> Option<Frame> {
    let mut current = graph.get(handle).and_then(|n| n.parent());
    while let Some(parent) = current {
        let node = graph.get(parent)?;
        if matches!(node.kind(), NodeKind::Skeleton(_)) {
            return None;
        }
        if let Some(transform) = node.as_transform() {
            return Some(Frame::of(transform));
        }
        current = node.parent();
    }
    None
}

/// Traverses `root` with default settings and returns the merged entity bounds.
pub fn traverse(graph: &mut SceneGraph, root: NodeHandle) -> BoundingBox {
    TraverseVisitor::new().traverse(graph, root).bounds
}
