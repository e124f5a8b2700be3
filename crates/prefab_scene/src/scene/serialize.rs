use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::atomic_io::write_text_atomic;
use crate::component::{Component, FieldMap};
use crate::content::PrefabStore;
use crate::value::ConversionError;

use super::builder::{BuildError, BuildOutcome, SceneGraphBuilder};
use super::graph::SceneGraph;
use super::node::EntityNode;
use super::overrides::OverrideResolver;
use super::record::{ComponentRecord, EntityRecord, RawFieldMap, SceneDocument};
use super::references::ReferenceResolver;

#[derive(Debug, Error)]
pub enum SceneFileError {
    #[error("read scene file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write scene file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode scene file '{}': {message}", .path.display())]
    Encode { path: PathBuf, message: String },
    #[error("scene file '{}': {source}", .path.display())]
    Build {
        path: PathBuf,
        #[source]
        source: BuildError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node '{node}' {field}: {source}")]
pub struct RecordEncodeError {
    pub node: String,
    pub field: String,
    #[source]
    pub source: ConversionError,
}

impl SceneGraph {
    pub fn to_records(&self) -> Result<Vec<EntityRecord>, RecordEncodeError> {
        self.iter_depth_first()
            .map(|(_, node)| {
                let parent_id = self
                    .parent(node.id())
                    .or_else(|| self.dangling_parent_id(node.id()))
                    .map(|parent| parent.as_str().to_string());
                entity_record(node, parent_id)
            })
            .collect()
    }

    pub fn to_scene_document(&self) -> Result<SceneDocument, RecordEncodeError> {
        Ok(SceneDocument::new(self.to_records()?))
    }
}

fn entity_record(
    node: &EntityNode,
    parent_id: Option<String>,
) -> Result<EntityRecord, RecordEncodeError> {
    let position = node.position.to_array();
    if !position.iter().all(|component| component.is_finite()) {
        return Err(encode_error(
            node,
            "position".to_string(),
            ConversionError::NonFinite(format!("{position:?}")),
        ));
    }
    let components = node
        .components()
        .map(|components| {
            components
                .iter()
                .map(|component| component_record(node, component))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let overrides = node
        .overrides()
        .map(|overrides| {
            overrides
                .iter()
                .map(|(component_type, fields)| {
                    let encoded = encode_fields(node, component_type, fields)?;
                    Ok((component_type.clone(), encoded))
                })
                .collect::<Result<BTreeMap<_, _>, RecordEncodeError>>()
        })
        .transpose()?;
    Ok(EntityRecord {
        id: node.id().as_str().to_string(),
        prefab_id: node.prefab_id().map(str::to_string),
        name: node.name.clone(),
        position,
        components,
        overrides,
        parent_id,
        order: node.order(),
    })
}

fn component_record(
    node: &EntityNode,
    component: &Component,
) -> Result<ComponentRecord, RecordEncodeError> {
    Ok(ComponentRecord {
        component_type: component.component_type.clone(),
        fields: encode_fields(node, &component.component_type, &component.fields)?,
    })
}

fn encode_fields(
    node: &EntityNode,
    component_type: &str,
    fields: &FieldMap,
) -> Result<RawFieldMap, RecordEncodeError> {
    fields
        .iter()
        .map(|(name, value)| {
            let encoded = value.to_json().map_err(|source| {
                encode_error(node, format!("{component_type}.{name}"), source)
            })?;
            Ok((name.clone(), encoded))
        })
        .collect()
}

fn encode_error(node: &EntityNode, field: String, source: ConversionError) -> RecordEncodeError {
    RecordEncodeError {
        node: node.id().as_str().to_string(),
        field,
        source,
    }
}

pub fn save_scene_document(path: &Path, graph: &SceneGraph) -> Result<(), SceneFileError> {
    let encode_failed = |message: String| SceneFileError::Encode {
        path: path.to_path_buf(),
        message,
    };
    let document = graph
        .to_scene_document()
        .map_err(|error| encode_failed(error.to_string()))?;
    let json = serde_json::to_string_pretty(&document)
        .map_err(|error| encode_failed(error.to_string()))?;
    write_text_atomic(path, &json).map_err(|source| SceneFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        entities = document.entities.len(),
        "scene_document_saved"
    );
    Ok(())
}

pub fn load_scene_document(path: &Path) -> Result<SceneDocument, SceneFileError> {
    let raw = read_scene(path)?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize::<_, SceneDocument>(&mut deserializer).map_err(|error| {
        let field_path = error.path().to_string();
        SceneFileError::Build {
            path: path.to_path_buf(),
            source: BuildError::Parse {
                path: field_path,
                message: error.into_inner().to_string(),
            },
        }
    })
}

pub fn load_scene_file(
    path: &Path,
    builder: &SceneGraphBuilder<'_>,
    references: &mut dyn ReferenceResolver,
) -> Result<BuildOutcome, SceneFileError> {
    let raw = read_scene(path)?;
    let outcome = builder
        .build_json(&raw, references)
        .map_err(|source| SceneFileError::Build {
            path: path.to_path_buf(),
            source,
        })?;
    info!(
        path = %path.display(),
        nodes = outcome.graph.len(),
        diagnostics = outcome.diagnostics.len(),
        "scene_file_loaded"
    );
    Ok(outcome)
}

fn read_scene(path: &Path) -> Result<String, SceneFileError> {
    fs::read_to_string(path).map_err(|source| SceneFileError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn graph_fingerprint(graph: &SceneGraph, store: &PrefabStore) -> String {
    let resolver = OverrideResolver::new(store);
    let mut hasher = Sha256::new();
    for (depth, node) in graph.iter_depth_first() {
        let mut line = format!(
            "{depth}\t{:?}\t{:?}\t{:?}\t{:?}",
            node.id().as_str(),
            node.name,
            node.prefab_id(),
            node.position.to_array()
        );
        for component in resolver.effective_components(node) {
            let _ = write!(line, "\t[{}", component.component_type);
            for (name, value) in &component.fields {
                let _ = write!(line, " {name}={value}");
            }
            line.push(']');
        }
        hasher.update(line.as_bytes());
        hasher.update([0u8]);
    }
    to_hex_lower(&hasher.finalize())
}

fn to_hex_lower(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}
