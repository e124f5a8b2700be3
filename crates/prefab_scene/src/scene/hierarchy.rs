use std::collections::HashMap;

use thiserror::Error;

use super::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReparentError {
    #[error("node {0} cannot be its own parent")]
    SelfParent(NodeId),
    #[error("moving {node} under {parent} would make it its own ancestor")]
    Cycle { node: NodeId, parent: NodeId },
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

#[derive(Debug, Default, Clone)]
struct Links {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default, Clone)]
pub struct HierarchyIndex {
    links: HashMap<NodeId, Links>,
}

impl HierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId) -> bool {
        if self.links.contains_key(&id) {
            return false;
        }
        self.links.insert(id, Links::default());
        true
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Vec<NodeId>> {
        let links = self.links.remove(id)?;
        if let Some(parent) = &links.parent {
            if let Some(parent_links) = self.links.get_mut(parent) {
                parent_links.children.retain(|child| child != id);
            }
        }
        for child in &links.children {
            if let Some(child_links) = self.links.get_mut(child) {
                child_links.parent = None;
            }
        }
        Some(links.children)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.links.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.links.get(id)?.parent.as_ref()
    }

    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.links
            .get(id)
            .map(|links| links.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_parent(
        &mut self,
        node: &NodeId,
        new_parent: Option<&NodeId>,
    ) -> Result<(), ReparentError> {
        self.set_parent_at(node, new_parent, usize::MAX)
    }

    pub fn set_parent_at(
        &mut self,
        node: &NodeId,
        new_parent: Option<&NodeId>,
        index: usize,
    ) -> Result<(), ReparentError> {
        self.check_reparent(node, new_parent)?;

        let old_parent = self
            .links
            .get_mut(node)
            .and_then(|links| links.parent.take());
        if let Some(old_parent) = old_parent {
            if let Some(parent_links) = self.links.get_mut(&old_parent) {
                parent_links.children.retain(|child| child != node);
            }
        }

        if let Some(parent) = new_parent {
            if let Some(parent_links) = self.links.get_mut(parent) {
                let index = index.min(parent_links.children.len());
                parent_links.children.insert(index, node.clone());
            }
            if let Some(links) = self.links.get_mut(node) {
                links.parent = Some(parent.clone());
            }
        }
        Ok(())
    }

    fn check_reparent(
        &self,
        node: &NodeId,
        new_parent: Option<&NodeId>,
    ) -> Result<(), ReparentError> {
        if !self.contains(node) {
            return Err(ReparentError::UnknownNode(node.clone()));
        }
        let Some(parent) = new_parent else {
            return Ok(());
        };
        if parent == node {
            return Err(ReparentError::SelfParent(node.clone()));
        }
        if !self.contains(parent) {
            return Err(ReparentError::UnknownNode(parent.clone()));
        }
        if self.ancestors(parent).any(|ancestor| ancestor == node) {
            return Err(ReparentError::Cycle {
                node: node.clone(),
                parent: parent.clone(),
            });
        }
        Ok(())
    }

    pub fn depth(&self, id: &NodeId) -> usize {
        self.ancestors(id).count()
    }

    pub fn ancestors(&self, id: &NodeId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            current: self.parent(id),
        }
    }

    pub fn is_ancestor_of(&self, ancestor: &NodeId, descendant: &NodeId) -> bool {
        self.ancestors(descendant).any(|id| id == ancestor)
    }
}

pub struct Ancestors<'a> {
    index: &'a HierarchyIndex,
    current: Option<&'a NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.index.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> NodeId {
        NodeId::from(value)
    }

    fn index_with(ids: &[&str]) -> HierarchyIndex {
        let mut index = HierarchyIndex::new();
        for value in ids {
            assert!(index.insert(id(value)));
        }
        index
    }

    #[test]
    fn set_parent_keeps_both_directions_consistent() {
        let mut index = index_with(&["a", "b", "c"]);
        index.set_parent(&id("c"), Some(&id("a"))).expect("attach");
        assert_eq!(index.children(&id("a")), &[id("c")]);
        assert_eq!(index.parent(&id("c")), Some(&id("a")));

        index.set_parent(&id("c"), Some(&id("b"))).expect("move");
        assert!(index.children(&id("a")).is_empty());
        assert_eq!(index.children(&id("b")), &[id("c")]);
        assert_eq!(index.parent(&id("c")), Some(&id("b")));

        index.set_parent(&id("c"), None).expect("detach");
        assert!(index.children(&id("b")).is_empty());
        assert_eq!(index.parent(&id("c")), None);
    }

    #[test]
    fn self_parent_is_rejected_without_mutation() {
        let mut index = index_with(&["a"]);
        let err = index.set_parent(&id("a"), Some(&id("a"))).expect_err("self");
        assert_eq!(err, ReparentError::SelfParent(id("a")));
        assert_eq!(index.parent(&id("a")), None);
        assert!(index.children(&id("a")).is_empty());
    }

    #[test]
    fn reparenting_under_a_descendant_leaves_parent_unchanged() {
        let mut index = index_with(&["root", "a", "b", "c"]);
        index.set_parent(&id("a"), Some(&id("root"))).expect("a");
        index.set_parent(&id("b"), Some(&id("a"))).expect("b");
        index.set_parent(&id("c"), Some(&id("b"))).expect("c");

        for descendant in ["b", "c"] {
            let err = index
                .set_parent(&id("a"), Some(&id(descendant)))
                .expect_err("cycle");
            assert!(matches!(err, ReparentError::Cycle { .. }));
            assert_eq!(index.parent(&id("a")), Some(&id("root")));
            assert_eq!(index.children(&id("root")), &[id("a")]);
        }
        assert_eq!(index.depth(&id("c")), 3);
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let mut index = index_with(&["a"]);
        assert_eq!(
            index.set_parent(&id("a"), Some(&id("ghost"))),
            Err(ReparentError::UnknownNode(id("ghost")))
        );
        assert_eq!(
            index.set_parent(&id("ghost"), None),
            Err(ReparentError::UnknownNode(id("ghost")))
        );
    }

    #[test]
    fn ancestry_is_irreflexive_and_antisymmetric() {
        let mut index = index_with(&["a", "b", "c", "d"]);
        index.set_parent(&id("b"), Some(&id("a"))).expect("b");
        index.set_parent(&id("c"), Some(&id("b"))).expect("c");
        index.set_parent(&id("d"), Some(&id("a"))).expect("d");

        let all = ["a", "b", "c", "d"];
        for x in all {
            assert!(!index.is_ancestor_of(&id(x), &id(x)));
            for y in all {
                if index.is_ancestor_of(&id(x), &id(y)) {
                    assert!(!index.is_ancestor_of(&id(y), &id(x)));
                }
            }
        }
        assert!(index.is_ancestor_of(&id("a"), &id("c")));
        assert!(!index.is_ancestor_of(&id("d"), &id("c")));
    }

    #[test]
    fn set_parent_at_inserts_at_clamped_index() {
        let mut index = index_with(&["p", "x", "y", "z"]);
        index.set_parent(&id("x"), Some(&id("p"))).expect("x");
        index.set_parent(&id("y"), Some(&id("p"))).expect("y");
        index
            .set_parent_at(&id("z"), Some(&id("p")), 1)
            .expect("z");
        assert_eq!(index.children(&id("p")), &[id("x"), id("z"), id("y")]);

        index
            .set_parent_at(&id("x"), Some(&id("p")), 99)
            .expect("x to end");
        assert_eq!(index.children(&id("p")), &[id("z"), id("y"), id("x")]);
    }

    #[test]
    fn remove_detaches_and_orphans_children() {
        let mut index = index_with(&["a", "b", "c"]);
        index.set_parent(&id("b"), Some(&id("a"))).expect("b");
        index.set_parent(&id("c"), Some(&id("b"))).expect("c");

        let orphans = index.remove(&id("b")).expect("removed");
        assert_eq!(orphans, vec![id("c")]);
        assert!(index.children(&id("a")).is_empty());
        assert_eq!(index.parent(&id("c")), None);
        assert!(!index.contains(&id("b")));
    }
}
