use std::collections::HashMap;

use tracing::{debug, info};

use crate::component::Component;
use crate::content::PrefabStore;
use crate::value::Value;

use super::graph::SceneGraph;
use super::hierarchy::ReparentError;
use super::node::{EntityNode, NodeData, NodeId, OverrideMap};
use super::overrides::OverrideResolver;

#[derive(Debug)]
pub struct EditSession {
    store: PrefabStore,
    graph: SceneGraph,
    cache: HashMap<NodeId, Vec<Component>>,
}

impl EditSession {
    pub fn begin(store: PrefabStore, graph: SceneGraph) -> Self {
        info!(
            templates = store.len(),
            nodes = graph.len(),
            "edit_session_started"
        );
        Self {
            store,
            graph,
            cache: HashMap::new(),
        }
    }

    pub fn store(&self) -> &PrefabStore {
        &self.store
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn resolver(&self) -> OverrideResolver<'_> {
        OverrideResolver::new(&self.store)
    }

    pub fn effective_components(&mut self, id: &NodeId) -> Option<&[Component]> {
        if !self.cache.contains_key(id) {
            let node = self.graph.node(id)?;
            let components = OverrideResolver::new(&self.store).effective_components(node);
            self.cache.insert(id.clone(), components);
        }
        self.cache.get(id).map(Vec::as_slice)
    }

    pub fn field_value(&self, id: &NodeId, component_type: &str, field: &str) -> Option<&Value> {
        let node = self.graph.node(id)?;
        OverrideResolver::new(&self.store).field_value(node, component_type, field)
    }

    pub fn is_field_overridden(&self, id: &NodeId, component_type: &str, field: &str) -> bool {
        self.graph.node(id).is_some_and(|node| {
            OverrideResolver::new(&self.store).is_field_overridden(node, component_type, field)
        })
    }

    pub fn set_field_value(
        &mut self,
        id: &NodeId,
        component_type: &str,
        field: &str,
        value: Value,
    ) -> bool {
        let resolver = OverrideResolver::new(&self.store);
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        resolver.set_field_value(node, component_type, field, value);
        self.cache.remove(id);
        true
    }

    pub fn reset_field(&mut self, id: &NodeId, component_type: &str, field: &str) -> bool {
        let resolver = OverrideResolver::new(&self.store);
        let removed = self
            .graph
            .node_mut(id)
            .is_some_and(|node| resolver.reset_field(node, component_type, field));
        if removed {
            self.cache.remove(id);
        }
        removed
    }

    pub fn reset_all_overrides(&mut self, id: &NodeId) -> usize {
        let resolver = OverrideResolver::new(&self.store);
        let removed = self
            .graph
            .node_mut(id)
            .map_or(0, |node| resolver.reset_all_overrides(node));
        if removed > 0 {
            self.cache.remove(id);
        }
        removed
    }

    pub fn place_instance(&mut self, name: &str, prefab_id: &str) -> NodeId {
        let id = self.graph.spawn(
            name,
            NodeData::Instance {
                prefab_id: prefab_id.to_string(),
                overrides: OverrideMap::new(),
            },
        );
        debug!(node = %id, prefab = prefab_id, "edit_session_placed_instance");
        id
    }

    pub fn reparent(
        &mut self,
        id: &NodeId,
        new_parent: Option<&NodeId>,
    ) -> Result<(), ReparentError> {
        self.graph.reparent(id, new_parent)
    }

    pub fn remove(&mut self, id: &NodeId) -> Vec<EntityNode> {
        let removed = self.graph.remove(id);
        for node in &removed {
            self.cache.remove(node.id());
        }
        removed
    }

    pub fn duplicate(&mut self, id: &NodeId) -> Option<NodeId> {
        self.graph.duplicate(id)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn end(mut self) -> (SceneGraph, PrefabStore) {
        let cached = self.cache.len();
        self.cache.clear();
        info!(nodes = self.graph.len(), cached, "edit_session_ended");
        (self.graph, self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PrefabTemplate;

    fn store() -> PrefabStore {
        let mut store = PrefabStore::new();
        store
            .publish(PrefabTemplate::new(
                "Lamp",
                vec![Component::new("Light")
                    .with_field("on", Value::Bool(true))
                    .with_field("range", Value::Float(4.0))],
            ))
            .expect("publish");
        store
    }

    #[test]
    fn writes_invalidate_the_cached_entry() {
        let mut session = EditSession::begin(store(), SceneGraph::new());
        let lamp = session.place_instance("Lamp", "Lamp");

        let before = session.effective_components(&lamp).expect("lamp").to_vec();
        assert_eq!(before[0].field("range"), Some(&Value::Float(4.0)));
        assert_eq!(session.cached_len(), 1);

        assert!(session.set_field_value(&lamp, "Light", "range", Value::Float(9.0)));
        assert_eq!(session.cached_len(), 0);
        let after = session.effective_components(&lamp).expect("lamp");
        assert_eq!(after[0].field("range"), Some(&Value::Float(9.0)));
        assert!(session.is_field_overridden(&lamp, "Light", "range"));

        assert!(session.reset_field(&lamp, "Light", "range"));
        assert_eq!(
            session.field_value(&lamp, "Light", "range"),
            Some(&Value::Float(4.0))
        );
    }

    #[test]
    fn removal_evicts_cached_subtree_and_end_returns_state() {
        let mut session = EditSession::begin(store(), SceneGraph::new());
        let parent = session.place_instance("Parent", "Lamp");
        let child = session.place_instance("Child", "Lamp");
        session.reparent(&child, Some(&parent)).expect("reparent");
        session.effective_components(&parent);
        session.effective_components(&child);
        assert_eq!(session.cached_len(), 2);

        let copy = session.duplicate(&parent).expect("duplicate");
        assert_eq!(session.graph().roots(), &[parent.clone(), copy]);

        assert_eq!(session.remove(&parent).len(), 2);
        assert_eq!(session.cached_len(), 0);
        assert!(!session.set_field_value(&child, "Light", "on", Value::Bool(false)));

        let (graph, store) = session.end();
        assert_eq!(graph.len(), 2);
        assert!(store.contains("Lamp"));
    }
}
