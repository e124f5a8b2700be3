use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::builder::BuildError;
use super::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};

pub const SCENE_FORMAT_VERSION: u32 = 1;

pub type RawFieldMap = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub fields: RawFieldMap,
}

impl ComponentRecord {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            fields: RawFieldMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefab_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<BTreeMap<String, RawFieldMap>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub order: i64,
}

impl EntityRecord {
    pub fn scratch(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            components: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn instance(id: impl Into<String>, prefab_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prefab_id: Some(prefab_id.into()),
            overrides: Some(BTreeMap::new()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_component(mut self, component: ComponentRecord) -> Self {
        self.components.get_or_insert_with(Vec::new).push(component);
        self
    }

    pub fn with_override(
        mut self,
        component_type: impl Into<String>,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.overrides
            .get_or_insert_with(BTreeMap::new)
            .entry(component_type.into())
            .or_default()
            .insert(field.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub entities: Vec<EntityRecord>,
}

impl SceneDocument {
    pub fn new(entities: Vec<EntityRecord>) -> Self {
        Self {
            format_version: SCENE_FORMAT_VERSION,
            entities,
        }
    }
}

fn default_format_version() -> u32 {
    SCENE_FORMAT_VERSION
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSceneDocument {
    #[serde(default)]
    format_version: Option<u32>,
    #[serde(default)]
    entities: Option<Vec<serde_json::Value>>,
}

pub type IndexedRecords = Vec<(usize, EntityRecord)>;

pub fn parse_scene_json(
    raw: &str,
    diagnostics: &mut DiagnosticSink,
) -> Result<IndexedRecords, BuildError> {
    let document: serde_json::Value =
        serde_json::from_str(raw).map_err(|error| BuildError::Parse {
            path: format!("line {} column {}", error.line(), error.column()),
            message: error.to_string(),
        })?;

    let entries = match document {
        serde_json::Value::Null => return Err(BuildError::MissingRecordCollection),
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(_) => {
            let document = serde_path_to_error::deserialize::<_, RawSceneDocument>(document)
                .map_err(path_error)?;
            let version = document.format_version.unwrap_or(SCENE_FORMAT_VERSION);
            if version > SCENE_FORMAT_VERSION {
                return Err(BuildError::UnsupportedFormatVersion {
                    found: version,
                    supported: SCENE_FORMAT_VERSION,
                });
            }
            document
                .entities
                .ok_or(BuildError::MissingRecordCollection)?
        }
        other => {
            return Err(BuildError::Parse {
                path: ".".to_string(),
                message: format!("expected a scene object or entity array, got {other}"),
            })
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_path_to_error::deserialize::<_, EntityRecord>(entry) {
            Ok(record) => records.push((index, record)),
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                let message = if path.is_empty() || path == "." {
                    format!("entities[{index}]: {source}")
                } else {
                    format!("entities[{index}].{path}: {source}")
                };
                diagnostics.report(
                    Diagnostic::new(DiagnosticKind::MalformedRecord, message).at_record(index),
                );
            }
        }
    }
    Ok(records)
}

fn path_error(error: serde_path_to_error::Error<serde_json::Error>) -> BuildError {
    let path = error.path().to_string();
    BuildError::Parse {
        path,
        message: error.into_inner().to_string(),
    }
}
