use std::collections::BTreeMap;

use crate::content::PrefabStore;
use crate::value::{FieldKind, Value};

pub type FieldMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub component_type: String,
    pub fields: FieldMap,
}

impl Component {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            fields: FieldMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ComponentSchemas {
    kinds: BTreeMap<String, BTreeMap<String, FieldKind>>,
}

impl ComponentSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        component_type: impl Into<String>,
        field: impl Into<String>,
        kind: FieldKind,
    ) -> Option<FieldKind> {
        self.kinds
            .entry(component_type.into())
            .or_default()
            .insert(field.into(), kind)
    }

    pub fn with_field(
        mut self,
        component_type: impl Into<String>,
        field: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        self.register(component_type, field, kind);
        self
    }

    pub fn extend_from_store(&mut self, store: &PrefabStore) {
        for template in store.templates() {
            for component in template.components() {
                let fields = self
                    .kinds
                    .entry(component.component_type.clone())
                    .or_default();
                for (name, value) in &component.fields {
                    fields.entry(name.clone()).or_insert(value.kind());
                }
            }
        }
    }

    pub fn field_kind(&self, component_type: &str, field: &str) -> Option<FieldKind> {
        self.kinds.get(component_type)?.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PrefabTemplate;

    #[test]
    fn extend_from_store_keeps_explicit_registrations() {
        let mut store = PrefabStore::new();
        store
            .publish(PrefabTemplate::new(
                "Torch",
                vec![Component::new("Light")
                    .with_field("radius", Value::Float(2.0))
                    .with_field("mode", Value::Enum("Flicker".to_string()))],
            ))
            .expect("publish");

        let mut schemas = ComponentSchemas::new().with_field("Light", "radius", FieldKind::Int);
        schemas.extend_from_store(&store);

        assert_eq!(schemas.field_kind("Light", "radius"), Some(FieldKind::Int));
        assert_eq!(schemas.field_kind("Light", "mode"), Some(FieldKind::Enum));
        assert_eq!(schemas.field_kind("Light", "missing"), None);
    }
}
