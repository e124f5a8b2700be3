use std::collections::{BTreeMap, BTreeSet};

use crate::content::PrefabStore;
use crate::value::Value;

use super::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use super::graph::SceneGraph;
use super::node::{EntityNode, NodeId};
use super::overrides::OverrideResolver;

#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    graph: &'a SceneGraph,
    store: &'a PrefabStore,
}

impl<'a> ResolveContext<'a> {
    pub fn new(graph: &'a SceneGraph, store: &'a PrefabStore) -> Self {
        Self { graph, store }
    }

    pub fn graph(&self) -> &'a SceneGraph {
        self.graph
    }

    pub fn store(&self) -> &'a PrefabStore {
        self.store
    }

    pub fn resolver(&self) -> OverrideResolver<'a> {
        OverrideResolver::new(self.store)
    }
}

/// Called once per constructed node after every node exists and is wired, so
/// a reference may point forward in the record list.
pub trait ReferenceResolver {
    fn resolve(
        &mut self,
        node: &EntityNode,
        context: &ResolveContext<'_>,
        diagnostics: &mut DiagnosticSink,
    );
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn resolve(&mut self, _: &EntityNode, _: &ResolveContext<'_>, _: &mut DiagnosticSink) {}
}

type LinkKey = (NodeId, String, String);

#[derive(Debug, Default, Clone)]
pub struct EntityLinkResolver {
    slots: BTreeSet<(String, String)>,
    links: BTreeMap<LinkKey, NodeId>,
}

impl EntityLinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, component_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.add_slot(component_type, field);
        self
    }

    pub fn add_slot(&mut self, component_type: impl Into<String>, field: impl Into<String>) {
        self.slots.insert((component_type.into(), field.into()));
    }

    pub fn link(&self, node: &NodeId, component_type: &str, field: &str) -> Option<&NodeId> {
        self.links
            .get(&(node.clone(), component_type.to_string(), field.to_string()))
    }

    pub fn links(&self) -> impl Iterator<Item = (&NodeId, &str, &str, &NodeId)> {
        self.links
            .iter()
            .map(|((source, component_type, field), target)| {
                (source, component_type.as_str(), field.as_str(), target)
            })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl ReferenceResolver for EntityLinkResolver {
    fn resolve(
        &mut self,
        node: &EntityNode,
        context: &ResolveContext<'_>,
        diagnostics: &mut DiagnosticSink,
    ) {
        let resolver = context.resolver();
        for (component_type, field) in &self.slots {
            let target = match resolver.field_value(node, component_type, field) {
                Some(Value::String(text)) | Some(Value::AssetRef(text)) if !text.is_empty() => {
                    NodeId::new(text.as_str())
                }
                _ => continue,
            };
            let key = (node.id().clone(), component_type.clone(), field.clone());
            if context.graph().contains(&target) {
                self.links.insert(key, target);
            } else {
                self.links.remove(&key);
                diagnostics.report(
                    Diagnostic::new(
                        DiagnosticKind::UnresolvedReference,
                        format!("{component_type}.{field} names unknown node '{target}'"),
                    )
                    .for_node(node.id()),
                );
            }
        }
    }
}
