use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::value::Value;

use super::template::PrefabTemplate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefabStoreError {
    #[error("prefab id cannot be empty")]
    EmptyId,
    #[error("prefab '{id}' is already published")]
    DuplicateId { id: String },
    #[error("prefab '{id}' declares component '{component_type}' more than once")]
    DuplicateComponent { id: String, component_type: String },
}

#[derive(Debug, Default, Clone)]
pub struct PrefabStore {
    templates: Vec<PrefabTemplate>,
    index_by_id: HashMap<String, usize>,
}

impl PrefabStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, template: PrefabTemplate) -> Result<(), PrefabStoreError> {
        validate_template(&template)?;
        if self.index_by_id.contains_key(template.id()) {
            return Err(PrefabStoreError::DuplicateId {
                id: template.id().to_string(),
            });
        }
        self.index_by_id
            .insert(template.id().to_string(), self.templates.len());
        self.templates.push(template);
        Ok(())
    }

    pub(crate) fn publish_replacing(
        &mut self,
        template: PrefabTemplate,
    ) -> Result<bool, PrefabStoreError> {
        validate_template(&template)?;
        match self.index_by_id.get(template.id()) {
            Some(&slot) => {
                self.templates[slot] = template;
                Ok(true)
            }
            None => {
                self.index_by_id
                    .insert(template.id().to_string(), self.templates.len());
                self.templates.push(template);
                Ok(false)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&PrefabTemplate> {
        self.index_by_id
            .get(id)
            .and_then(|slot| self.templates.get(*slot))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn field_default(
        &self,
        template_id: &str,
        component_type: &str,
        field: &str,
    ) -> Option<&Value> {
        self.get(template_id)?.field_default(component_type, field)
    }

    pub fn templates(&self) -> &[PrefabTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn validate_template(template: &PrefabTemplate) -> Result<(), PrefabStoreError> {
    if template.id().trim().is_empty() {
        return Err(PrefabStoreError::EmptyId);
    }
    let mut seen = HashSet::new();
    for component in template.components() {
        if !seen.insert(component.component_type.as_str()) {
            return Err(PrefabStoreError::DuplicateComponent {
                id: template.id().to_string(),
                component_type: component.component_type.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    fn goblin() -> PrefabTemplate {
        PrefabTemplate::new(
            "Goblin",
            vec![
                Component::new("Stats").with_field("hp", Value::Int(10)),
                Component::new("Sprite")
                    .with_field("image", Value::AssetRef("goblin.png".to_string())),
            ],
        )
    }

    #[test]
    fn publish_then_lookup_by_id_and_field() {
        let mut store = PrefabStore::new();
        store.publish(goblin()).expect("publish");

        assert!(store.contains("Goblin"));
        assert_eq!(
            store.field_default("Goblin", "Stats", "hp"),
            Some(&Value::Int(10))
        );
        assert_eq!(store.field_default("Goblin", "Stats", "mp"), None);
        assert_eq!(store.field_default("Orc", "Stats", "hp"), None);
        assert!(store.get("Orc").is_none());
    }

    #[test]
    fn duplicate_publish_is_rejected() {
        let mut store = PrefabStore::new();
        store.publish(goblin()).expect("publish");
        let err = store.publish(goblin()).expect_err("duplicate");
        assert_eq!(
            err,
            PrefabStoreError::DuplicateId {
                id: "Goblin".to_string()
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn template_with_repeated_component_type_is_rejected() {
        let mut store = PrefabStore::new();
        let err = store
            .publish(PrefabTemplate::new(
                "Broken",
                vec![Component::new("Stats"), Component::new("Stats")],
            ))
            .expect_err("duplicate component");
        assert!(matches!(err, PrefabStoreError::DuplicateComponent { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn publish_replacing_keeps_original_slot() {
        let mut store = PrefabStore::new();
        store.publish(goblin()).expect("publish");
        store
            .publish(PrefabTemplate::new("Torch", Vec::new()))
            .expect("publish");
        let replaced = store
            .publish_replacing(PrefabTemplate::new(
                "Goblin",
                vec![Component::new("Stats").with_field("hp", Value::Int(12))],
            ))
            .expect("replace");

        assert!(replaced);
        assert_eq!(store.templates()[0].id(), "Goblin");
        assert_eq!(
            store.field_default("Goblin", "Stats", "hp"),
            Some(&Value::Int(12))
        );
    }
}
