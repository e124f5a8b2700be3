use crate::component::{Component, FieldMap};
use crate::content::{PrefabStore, PrefabTemplate};
use crate::value::Value;

use super::node::{EntityNode, NodeData, OverrideMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateLink {
    Scratch,
    Valid,
    Missing,
}

#[derive(Debug, Clone, Copy)]
pub struct OverrideResolver<'a> {
    store: &'a PrefabStore,
}

impl<'a> OverrideResolver<'a> {
    pub fn new(store: &'a PrefabStore) -> Self {
        Self { store }
    }

    pub fn template_link(&self, node: &EntityNode) -> TemplateLink {
        match node.prefab_id() {
            None => TemplateLink::Scratch,
            Some(prefab_id) if self.store.contains(prefab_id) => TemplateLink::Valid,
            Some(_) => TemplateLink::Missing,
        }
    }

    fn template_of(&self, node: &EntityNode) -> Option<&'a PrefabTemplate> {
        self.store.get(node.prefab_id()?)
    }

    pub fn effective_components(&self, node: &EntityNode) -> Vec<Component> {
        match node.data() {
            NodeData::Scratch { components } => components.clone(),
            NodeData::Instance {
                prefab_id,
                overrides,
            } => {
                let Some(template) = self.store.get(prefab_id) else {
                    return Vec::new();
                };
                template
                    .components()
                    .iter()
                    .map(|definition| {
                        let mut merged = definition.clone();
                        if let Some(fields) = overrides.get(&definition.component_type) {
                            for (name, value) in fields {
                                merged.fields.insert(name.clone(), value.clone());
                            }
                        }
                        merged
                    })
                    .collect()
            }
        }
    }

    pub fn field_value<'n>(
        &self,
        node: &'n EntityNode,
        component_type: &str,
        field: &str,
    ) -> Option<&'n Value>
    where
        'a: 'n,
    {
        match node.data() {
            NodeData::Scratch { components } => components
                .iter()
                .find(|component| component.component_type == component_type)?
                .field(field),
            NodeData::Instance {
                prefab_id,
                overrides,
            } => {
                let template = self.store.get(prefab_id)?;
                overrides
                    .get(component_type)
                    .and_then(|fields| fields.get(field))
                    .or_else(|| template.field_default(component_type, field))
            }
        }
    }

    pub fn set_field_value(
        &self,
        node: &mut EntityNode,
        component_type: &str,
        field: &str,
        value: Value,
    ) {
        match node.data_mut() {
            NodeData::Scratch { components } => {
                let index = match components
                    .iter()
                    .position(|component| component.component_type == component_type)
                {
                    Some(index) => index,
                    None => {
                        components.push(Component::new(component_type));
                        components.len() - 1
                    }
                };
                components[index].fields.insert(field.to_string(), value);
            }
            NodeData::Instance { overrides, .. } => {
                overrides
                    .entry(component_type.to_string())
                    .or_default()
                    .insert(field.to_string(), value);
            }
        }
    }

    /// True only when an override exists and differs from the template
    /// default. Dirty-but-equal overrides report false.
    pub fn is_field_overridden(&self, node: &EntityNode, component_type: &str, field: &str) -> bool {
        let Some(overrides) = node.overrides() else {
            return false;
        };
        let Some(value) = overrides
            .get(component_type)
            .and_then(|fields| fields.get(field))
        else {
            return false;
        };
        let Some(template) = self.template_of(node) else {
            return false;
        };
        !values_equal(Some(value), template.field_default(component_type, field))
    }

    pub fn overridden_fields(&self, node: &EntityNode) -> Vec<(String, String)> {
        let Some(overrides) = node.overrides() else {
            return Vec::new();
        };
        overrides
            .iter()
            .flat_map(|(component_type, fields)| {
                fields
                    .keys()
                    .map(move |field| (component_type.clone(), field.clone()))
            })
            .filter(|(component_type, field)| self.is_field_overridden(node, component_type, field))
            .collect()
    }

    pub fn reset_field(&self, node: &mut EntityNode, component_type: &str, field: &str) -> bool {
        let Some(overrides) = instance_overrides_mut(node) else {
            return false;
        };
        let Some(fields) = overrides.get_mut(component_type) else {
            return false;
        };
        let removed = fields.remove(field).is_some();
        if fields.is_empty() {
            overrides.remove(component_type);
        }
        removed
    }

    pub fn reset_component(&self, node: &mut EntityNode, component_type: &str) -> usize {
        instance_overrides_mut(node)
            .and_then(|overrides| overrides.remove(component_type))
            .map(|fields| fields.len())
            .unwrap_or(0)
    }

    pub fn reset_all_overrides(&self, node: &mut EntityNode) -> usize {
        let Some(overrides) = instance_overrides_mut(node) else {
            return 0;
        };
        let removed = overrides.values().map(FieldMap::len).sum();
        overrides.clear();
        removed
    }

    pub fn prune_redundant_overrides(&self, node: &mut EntityNode) -> usize {
        let Some(template) = self.template_of(node) else {
            return 0;
        };
        let Some(overrides) = instance_overrides_mut(node) else {
            return 0;
        };
        let mut removed = 0;
        overrides.retain(|component_type, fields| {
            fields.retain(|field, value| {
                let redundant =
                    values_equal(Some(&*value), template.field_default(component_type, field));
                if redundant {
                    removed += 1;
                }
                !redundant
            });
            !fields.is_empty()
        });
        removed
    }
}

pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn instance_overrides_mut(node: &mut EntityNode) -> Option<&mut OverrideMap> {
    match node.data_mut() {
        NodeData::Scratch { .. } => None,
        NodeData::Instance { overrides, .. } => Some(overrides),
    }
}
