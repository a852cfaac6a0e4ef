use std::rc::Rc;

use foundation::arena::Arena;
use foundation::handles::Handle;
use foundation::math::Mat4;

use crate::components::{Shape, Transform};
use crate::material::{BasicMaterial, LineMaterial, MeshMaterials, RippleUniforms};
use crate::mesh::{LineGeometry, MeshGeometry};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub Handle);

impl NodeId {
    pub fn index(&self) -> u32 {
        self.0.index()
    }
}

/// Handle of a DOM-backed overlay element owned by a label node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelElementId(pub u64);

/// Interaction metadata carried by region meshes.
///
/// The region name is a lookup key only; meshes never own their region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTag {
    pub region_name: String,
    pub original_y: f64,
    pub is_hovered: bool,
    pub is_clickable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub geometry: Rc<MeshGeometry>,
    pub materials: MeshMaterials,
    pub region: Option<RegionTag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNode {
    pub geometry: Rc<LineGeometry>,
    pub material: LineMaterial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveNode {
    pub shape: Shape,
    pub material: BasicMaterial,
    pub ripple: Option<RippleUniforms>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelNode {
    pub element: LabelElementId,
    /// Resting local Y; hover lifts are offsets from here.
    pub base_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
    Lines(LineNode),
    Primitive(PrimitiveNode),
    Label(LabelNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub render_order: i32,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            visible: true,
            render_order: 0,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn region(&self) -> Option<&RegionTag> {
        self.as_mesh().and_then(|m| m.region.as_ref())
    }

    pub fn region_mut(&mut self) -> Option<&mut RegionTag> {
        match &mut self.kind {
            NodeKind::Mesh(m) => m.region.as_mut(),
            _ => None,
        }
    }
}

/// What a subtree removal released.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Disposal {
    pub nodes: Vec<NodeId>,
    pub labels: Vec<LabelElementId>,
}

impl Disposal {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn merge(&mut self, other: Disposal) {
        self.nodes.extend(other.nodes);
        self.labels.extend(other.labels);
    }
}

/// Strict-tree scene graph.
///
/// Parents own their children: removing a node removes its whole subtree.
/// Removed nodes are queued in `released` until a renderer drains them, so
/// GPU buffers keyed by `NodeId` can be freed in the same frame.
///
/// Ordering contract:
/// - `children()` keeps insertion order.
/// - `visit_visible()` is depth-first pre-order over visible subtrees.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: Arena<Node>,
    root: NodeId,
    released: Vec<NodeId>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root = NodeId(nodes.insert(Node::group("root")));
        Self {
            nodes,
            root,
            released: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Attach `node` under `parent`; `None` if the parent is gone.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        node.parent = Some(parent);
        node.children.clear();
        let id = NodeId(self.nodes.insert(node));
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        Some(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    /// Detach and drop `id` with every descendant.
    pub fn remove(&mut self, id: NodeId) -> Disposal {
        let mut out = Disposal::default();
        if id == self.root || !self.contains(id) {
            return out;
        }
        if let Some(parent) = self.get(id).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(parent.0)
        {
            p.children.retain(|c| *c != id);
        }
        self.release_subtree(id, &mut out);
        out
    }

    /// Drop every child of `id`, keeping `id` itself.
    pub fn clear_children(&mut self, id: NodeId) -> Disposal {
        let mut out = Disposal::default();
        let children = match self.nodes.get_mut(id.0) {
            Some(node) => std::mem::take(&mut node.children),
            None => return out,
        };
        for child in children {
            self.release_subtree(child, &mut out);
        }
        out
    }

    fn release_subtree(&mut self, id: NodeId, out: &mut Disposal) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(current.0) else {
                continue;
            };
            if let NodeKind::Label(label) = &node.kind {
                out.labels.push(label.element);
            }
            stack.extend(node.children.iter().rev().copied());
            out.nodes.push(current);
            self.released.push(current);
        }
    }

    /// Node ids removed since the last drain.
    pub fn drain_released(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.released)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.get_mut(id) {
            node.visible = visible;
        }
    }

    /// Visible only if the node and every ancestor are visible.
    pub fn is_visible_in_tree(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.get(cur) else {
                return false;
            };
            if !node.visible {
                return false;
            }
            current = node.parent;
        }
        true
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.get(cur)?;
            chain.push(node.transform.matrix());
            current = node.parent;
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(Mat4::IDENTITY, |acc, local| acc.mul(local)),
        )
    }

    /// Walk visible nodes with their world matrices.
    pub fn visit_visible<F: FnMut(NodeId, &Node, &Mat4)>(&self, mut visit: F) {
        let mut stack: Vec<(NodeId, Mat4)> = vec![(self.root, Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world.mul(&node.transform.matrix());
            visit(id, node, &world);
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
    }

    /// All descendants of `id` (excluding `id`) in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{LabelElementId, LabelNode, Node, NodeKind, SceneGraph};
    use crate::components::Transform;
    use foundation::math::Vec3;

    fn label(id: u64) -> Node {
        Node::new(
            "label",
            NodeKind::Label(LabelNode {
                element: LabelElementId(id),
                base_y: 0.0,
            }),
        )
    }

    #[test]
    fn remove_releases_whole_subtree_and_labels() {
        let mut g = SceneGraph::new();
        let root = g.root();
        let a = g.add(root, Node::group("a")).expect("a");
        let b = g.add(a, Node::group("b")).expect("b");
        let _l1 = g.add(a, label(1)).expect("l1");
        let _l2 = g.add(b, label(2)).expect("l2");
        assert_eq!(g.len(), 5);

        let disposal = g.remove(a);
        assert_eq!(disposal.nodes.len(), 4);
        assert_eq!(disposal.labels, vec![LabelElementId(2), LabelElementId(1)]);
        assert!(g.children(root).is_empty());
        assert!(!g.contains(b));
        assert_eq!(g.drain_released().len(), 4);
        assert!(g.drain_released().is_empty());
    }

    #[test]
    fn add_to_removed_parent_fails() {
        let mut g = SceneGraph::new();
        let a = g.add(g.root(), Node::group("a")).expect("a");
        g.remove(a);
        assert!(g.add(a, Node::group("orphan")).is_none());
        assert!(g.remove(g.root()).is_empty());
    }

    #[test]
    fn clear_children_keeps_parent() {
        let mut g = SceneGraph::new();
        let a = g.add(g.root(), Node::group("a")).expect("a");
        g.add(a, label(7));
        g.add(a, Node::group("c"));
        let disposal = g.clear_children(a);
        assert_eq!(disposal.nodes.len(), 2);
        assert!(g.contains(a));
        assert!(g.children(a).is_empty());
    }

    #[test]
    fn visibility_is_inherited_and_matrices_compose() {
        let mut g = SceneGraph::new();
        let a = g
            .add(
                g.root(),
                Node::group("a").with_transform(Transform::translate(Vec3::new(1.0, 0.0, 0.0))),
            )
            .expect("a");
        let b = g
            .add(
                a,
                Node::group("b").with_transform(Transform::translate(Vec3::new(0.0, 2.0, 0.0))),
            )
            .expect("b");
        let world = g.world_matrix(b).expect("matrix");
        assert_eq!(world.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));

        g.set_visible(a, false);
        assert!(!g.is_visible_in_tree(b));
        let mut seen = Vec::new();
        g.visit_visible(|id, _, _| seen.push(id));
        assert_eq!(seen, vec![g.root()]);
        assert_eq!(g.descendants(g.root()), vec![a, b]);
    }
}
