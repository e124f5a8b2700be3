use std::collections::BTreeMap;
use std::fmt;

use crate::component::{Component, FieldMap};

pub type OverrideMap = BTreeMap<String, FieldMap>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn allocate(&mut self, taken: impl Fn(&NodeId) -> bool) -> NodeId {
        loop {
            let id = NodeId(format!("node-{:06}", self.next));
            self.next = self.next.saturating_add(1);
            if !taken(&id) {
                return id;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(value: [f32; 3]) -> Self {
        Self {
            x: value[0],
            y: value[1],
            z: value[2],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Scratch { components: Vec<Component> },
    Instance { prefab_id: String, overrides: OverrideMap },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    id: NodeId,
    pub name: String,
    pub position: Vec3,
    order: i64,
    data: NodeData,
}

impl EntityNode {
    pub fn new(id: NodeId, name: impl Into<String>, data: NodeData) -> Self {
        Self {
            id,
            name: name.into(),
            position: Vec3::default(),
            order: 0,
            data,
        }
    }

    pub fn scratch(id: NodeId, name: impl Into<String>, components: Vec<Component>) -> Self {
        Self::new(id, name, NodeData::Scratch { components })
    }

    pub fn instance(id: NodeId, name: impl Into<String>, prefab_id: impl Into<String>) -> Self {
        Self::new(
            id,
            name,
            NodeData::Instance {
                prefab_id: prefab_id.into(),
                overrides: OverrideMap::new(),
            },
        )
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Kept equal to the node's index among its siblings by the owning graph.
    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self.data, NodeData::Scratch { .. })
    }

    pub fn prefab_id(&self) -> Option<&str> {
        match &self.data {
            NodeData::Scratch { .. } => None,
            NodeData::Instance { prefab_id, .. } => Some(prefab_id),
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn components(&self) -> Option<&[Component]> {
        match &self.data {
            NodeData::Scratch { components } => Some(components),
            NodeData::Instance { .. } => None,
        }
    }

    pub fn overrides(&self) -> Option<&OverrideMap> {
        match &self.data {
            NodeData::Scratch { .. } => None,
            NodeData::Instance { overrides, .. } => Some(overrides),
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut NodeData {
        &mut self.data
    }

    pub(crate) fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    pub(crate) fn with_id(&self, id: NodeId) -> Self {
        Self {
            id,
            name: self.name.clone(),
            position: self.position,
            order: self.order,
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_and_instance_discriminant() {
        let scratch = EntityNode::scratch(NodeId::from("a"), "A", Vec::new());
        let instance = EntityNode::instance(NodeId::from("b"), "B", "Torch");

        assert!(scratch.is_scratch());
        assert_eq!(scratch.prefab_id(), None);
        assert!(scratch.components().is_some());
        assert!(scratch.overrides().is_none());

        assert!(!instance.is_scratch());
        assert_eq!(instance.prefab_id(), Some("Torch"));
        assert!(instance.components().is_none());
        assert!(instance.overrides().is_some_and(|map| map.is_empty()));
    }

    #[test]
    fn allocator_skips_taken_ids() {
        let mut allocator = NodeIdAllocator::default();
        let first = allocator.allocate(|id| id.as_str() == "node-000000");
        assert_eq!(first.as_str(), "node-000001");
        let second = allocator.allocate(|_| false);
        assert_eq!(second.as_str(), "node-000002");
    }
}
