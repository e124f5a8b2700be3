use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use super::hierarchy::{HierarchyIndex, ReparentError};
use super::node::{EntityNode, NodeData, NodeId, NodeIdAllocator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node id {0} is already in use")]
    DuplicateId(NodeId),
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, EntityNode>,
    hierarchy: HierarchyIndex,
    roots: Vec<NodeId>,
    dangling_parents: HashMap<NodeId, NodeId>,
    allocator: NodeIdAllocator,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        nodes: HashMap<NodeId, EntityNode>,
        hierarchy: HierarchyIndex,
        dangling_parents: HashMap<NodeId, NodeId>,
    ) -> Self {
        Self {
            nodes,
            hierarchy,
            roots: Vec::new(),
            dangling_parents,
            allocator: NodeIdAllocator::default(),
        }
    }

    pub(crate) fn attach_roots(&mut self, roots: Vec<NodeId>) {
        self.roots = roots;
        let parents = self
            .iter_depth_first()
            .map(|(_, node)| node.id().clone())
            .collect::<Vec<_>>();
        self.renumber_siblings(None);
        for parent in &parents {
            self.renumber_siblings(Some(parent));
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&EntityNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut EntityNode> {
        self.nodes.get_mut(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.hierarchy.children(id)
    }

    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.hierarchy.parent(id)
    }

    pub fn depth(&self, id: &NodeId) -> usize {
        self.hierarchy.depth(id)
    }

    pub fn is_ancestor_of(&self, ancestor: &NodeId, descendant: &NodeId) -> bool {
        self.hierarchy.is_ancestor_of(ancestor, descendant)
    }

    /// Parent id a node was serialized with but which did not resolve when
    /// it was loaded. Cleared once the node is explicitly reparented.
    pub fn dangling_parent_id(&self, id: &NodeId) -> Option<&NodeId> {
        self.dangling_parents.get(id)
    }

    pub fn allocate_id(&mut self) -> NodeId {
        let nodes = &self.nodes;
        self.allocator.allocate(|id| nodes.contains_key(id))
    }

    pub fn insert_node(&mut self, node: EntityNode) -> Result<NodeId, GraphError> {
        let id = node.id().clone();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.nodes.insert(id.clone(), node);
        self.hierarchy.insert(id.clone());
        self.roots.push(id.clone());
        self.renumber_siblings(None);
        Ok(id)
    }

    pub fn spawn(&mut self, name: impl Into<String>, data: NodeData) -> NodeId {
        let id = self.allocate_id();
        let node = EntityNode::new(id.clone(), name, data);
        self.nodes.insert(id.clone(), node);
        self.hierarchy.insert(id.clone());
        self.roots.push(id.clone());
        self.renumber_siblings(None);
        id
    }

    pub fn reparent(
        &mut self,
        node: &NodeId,
        new_parent: Option<&NodeId>,
    ) -> Result<(), ReparentError> {
        let old_parent = self.hierarchy.parent(node).cloned();
        if let Err(error) = self.hierarchy.set_parent(node, new_parent) {
            warn!(
                node = %node,
                new_parent = ?new_parent.map(NodeId::as_str),
                error = %error,
                "scene_reparent_rejected"
            );
            return Err(error);
        }

        if old_parent.is_none() {
            self.roots.retain(|root| root != node);
        }
        if new_parent.is_none() {
            self.roots.push(node.clone());
        }
        self.dangling_parents.remove(node);
        self.renumber_siblings(old_parent.as_ref());
        self.renumber_siblings(new_parent);
        Ok(())
    }

    pub fn remove(&mut self, id: &NodeId) -> Vec<EntityNode> {
        let subtree = self.subtree_ids(id);
        if subtree.is_empty() {
            return Vec::new();
        }
        let parent = self.hierarchy.parent(id).cloned();
        for member in subtree.iter().rev() {
            self.hierarchy.remove(member);
        }
        if parent.is_none() {
            self.roots.retain(|root| root != id);
        }

        let mut removed = Vec::with_capacity(subtree.len());
        for member in &subtree {
            self.dangling_parents.remove(member);
            if let Some(node) = self.nodes.remove(member) {
                removed.push(node);
            }
        }
        self.renumber_siblings(parent.as_ref());
        debug!(node = %id, removed = removed.len(), "scene_subtree_removed");
        removed
    }

    pub fn duplicate(&mut self, id: &NodeId) -> Option<NodeId> {
        let sources = self.subtree_ids(id);
        if sources.is_empty() {
            return None;
        }

        let mut fresh_ids = HashMap::with_capacity(sources.len());
        for source in &sources {
            let fresh = self.allocate_id();
            let Some(copy) = self.nodes.get(source).map(|node| node.with_id(fresh.clone())) else {
                continue;
            };
            self.nodes.insert(fresh.clone(), copy);
            self.hierarchy.insert(fresh.clone());
            fresh_ids.insert(source.clone(), fresh);
        }

        for source in sources.iter().skip(1) {
            let parent = self
                .hierarchy
                .parent(source)
                .and_then(|parent| fresh_ids.get(parent))
                .cloned();
            if let (Some(fresh), Some(parent)) = (fresh_ids.get(source), parent) {
                if let Err(error) = self.hierarchy.set_parent(fresh, Some(&parent)) {
                    warn!(node = %fresh, error = %error, "scene_duplicate_wiring_failed");
                }
            }
        }

        let copy_root = fresh_ids.get(id)?.clone();
        let parent = self.hierarchy.parent(id).cloned();
        match &parent {
            Some(parent) => {
                let index = self
                    .hierarchy
                    .children(parent)
                    .iter()
                    .position(|child| child == id)
                    .map_or(usize::MAX, |index| index + 1);
                if let Err(error) = self.hierarchy.set_parent_at(&copy_root, Some(parent), index) {
                    warn!(node = %copy_root, error = %error, "scene_duplicate_wiring_failed");
                    self.roots.push(copy_root.clone());
                }
            }
            None => {
                let index = self
                    .roots
                    .iter()
                    .position(|root| root == id)
                    .map_or(self.roots.len(), |index| index + 1);
                self.roots.insert(index, copy_root.clone());
            }
        }
        self.renumber_siblings(parent.as_ref());
        self.renumber_siblings(None);
        debug!(source = %id, copy = %copy_root, nodes = sources.len(), "scene_subtree_duplicated");
        Some(copy_root)
    }

    pub fn subtree_ids(&self, id: &NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(id) {
            return Vec::new();
        }
        let mut ids = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.hierarchy.children(&current).iter().rev().cloned());
            ids.push(current);
        }
        ids
    }

    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: self.roots.iter().rev().map(|id| (0, id)).collect(),
        }
    }

    fn renumber_siblings(&mut self, parent: Option<&NodeId>) {
        let siblings = match parent {
            Some(parent) => self.hierarchy.children(parent),
            None => self.roots.as_slice(),
        };
        for (index, id) in siblings.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.set_order(index as i64);
            }
        }
    }
}

pub struct DepthFirst<'a> {
    graph: &'a SceneGraph,
    stack: Vec<(usize, &'a NodeId)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a EntityNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((depth, id)) = self.stack.pop() {
            self.stack.extend(
                self.graph
                    .hierarchy
                    .children(id)
                    .iter()
                    .rev()
                    .map(|child| (depth + 1, child)),
            );
            if let Some(node) = self.graph.nodes.get(id) {
                return Some((depth, node));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::value::Value;

    fn scratch(graph: &mut SceneGraph, name: &str) -> NodeId {
        graph.spawn(
            name,
            NodeData::Scratch {
                components: vec![Component::new("Tag").with_field("name", Value::String(name.to_string()))],
            },
        )
    }

    fn names(graph: &SceneGraph) -> Vec<(usize, String)> {
        graph
            .iter_depth_first()
            .map(|(depth, node)| (depth, node.name.clone()))
            .collect()
    }

    #[test]
    fn spawn_allocates_unique_ids_and_appends_roots() {
        let mut graph = SceneGraph::new();
        let a = scratch(&mut graph, "a");
        let b = scratch(&mut graph, "b");
        assert_ne!(a, b);
        assert_eq!(graph.roots(), &[a.clone(), b.clone()]);
        assert_eq!(graph.node(&b).map(EntityNode::order), Some(1));
    }

    #[test]
    fn insert_node_rejects_duplicate_ids() {
        let mut graph = SceneGraph::new();
        graph
            .insert_node(EntityNode::scratch(NodeId::from("x"), "x", Vec::new()))
            .expect("insert");
        let err = graph
            .insert_node(EntityNode::scratch(NodeId::from("x"), "again", Vec::new()))
            .expect_err("duplicate");
        assert_eq!(err, GraphError::DuplicateId(NodeId::from("x")));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn reparent_updates_roots_and_sibling_orders() {
        let mut graph = SceneGraph::new();
        let a = scratch(&mut graph, "a");
        let b = scratch(&mut graph, "b");
        let c = scratch(&mut graph, "c");

        graph.reparent(&b, Some(&a)).expect("b under a");
        graph.reparent(&c, Some(&a)).expect("c under a");
        assert_eq!(graph.roots(), &[a.clone()]);
        assert_eq!(graph.children(&a), &[b.clone(), c.clone()]);
        assert_eq!(graph.node(&c).map(EntityNode::order), Some(1));

        graph.reparent(&b, None).expect("b to root");
        assert_eq!(graph.roots(), &[a.clone(), b.clone()]);
        assert_eq!(graph.node(&c).map(EntityNode::order), Some(0));
        assert_eq!(graph.node(&b).map(EntityNode::order), Some(1));
    }

    #[test]
    fn rejected_reparent_leaves_graph_unchanged() {
        let mut graph = SceneGraph::new();
        let a = scratch(&mut graph, "a");
        let b = scratch(&mut graph, "b");
        graph.reparent(&b, Some(&a)).expect("b under a");

        let before = names(&graph);
        assert!(matches!(
            graph.reparent(&a, Some(&b)),
            Err(ReparentError::Cycle { .. })
        ));
        assert!(matches!(
            graph.reparent(&a, Some(&a)),
            Err(ReparentError::SelfParent(_))
        ));
        assert_eq!(names(&graph), before);
        assert_eq!(graph.parent(&a), None);
        assert_eq!(graph.roots(), &[a]);
    }

    #[test]
    fn remove_drops_whole_subtree_and_renumbers() {
        let mut graph = SceneGraph::new();
        let a = scratch(&mut graph, "a");
        let b = scratch(&mut graph, "b");
        let c = scratch(&mut graph, "c");
        let d = scratch(&mut graph, "d");
        graph.reparent(&c, Some(&b)).expect("c under b");

        let removed = graph.remove(&b);
        assert_eq!(removed.len(), 2);
        assert!(!graph.contains(&b));
        assert!(!graph.contains(&c));
        assert_eq!(graph.roots(), &[a, d.clone()]);
        assert_eq!(graph.node(&d).map(EntityNode::order), Some(1));
        assert!(graph.remove(&b).is_empty());
    }

    #[test]
    fn duplicate_copies_subtree_with_fresh_ids_next_to_source() {
        let mut graph = SceneGraph::new();
        let parent = scratch(&mut graph, "parent");
        let torch = scratch(&mut graph, "torch");
        let flame = scratch(&mut graph, "flame");
        let tail = scratch(&mut graph, "tail");
        graph.reparent(&torch, Some(&parent)).expect("torch");
        graph.reparent(&tail, Some(&parent)).expect("tail");
        graph.reparent(&flame, Some(&torch)).expect("flame");

        let copy = graph.duplicate(&torch).expect("copy");
        assert_ne!(copy, torch);
        assert_eq!(graph.children(&parent), &[torch.clone(), copy.clone(), tail]);
        let copy_children = graph.children(&copy);
        assert_eq!(copy_children.len(), 1);
        assert_ne!(copy_children[0], flame);
        assert_eq!(
            graph.node(&copy_children[0]).map(|node| node.name.as_str()),
            Some("flame")
        );
        assert_eq!(graph.len(), 6);
    }

    #[test]
    fn depth_first_visits_roots_then_children_in_order() {
        let mut graph = SceneGraph::new();
        let a = scratch(&mut graph, "a");
        let b = scratch(&mut graph, "b");
        let c = scratch(&mut graph, "c");
        scratch(&mut graph, "d");
        graph.reparent(&b, Some(&a)).expect("b");
        graph.reparent(&c, Some(&b)).expect("c");

        assert_eq!(
            names(&graph),
            vec![
                (0, "a".to_string()),
                (1, "b".to_string()),
                (2, "c".to_string()),
                (0, "d".to_string()),
            ]
        );
        assert_eq!(graph.depth(&c), 2);
    }
}
