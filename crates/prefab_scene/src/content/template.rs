use crate::component::Component;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct PrefabTemplate {
    id: String,
    components: Vec<Component>,
}

impl PrefabTemplate {
    pub fn new(id: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            id: id.into(),
            components,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, component_type: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|component| component.component_type == component_type)
    }

    pub fn field_default(&self, component_type: &str, field: &str) -> Option<&Value> {
        self.component(component_type)?.field(field)
    }
}
