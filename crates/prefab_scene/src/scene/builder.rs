use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::component::{Component, ComponentSchemas, FieldMap};
use crate::content::PrefabStore;
use crate::value::{FieldKind, Value};

use super::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use super::graph::SceneGraph;
use super::hierarchy::HierarchyIndex;
use super::node::{EntityNode, NodeData, NodeId, OverrideMap, Vec3};
use super::record::{
    parse_scene_json, ComponentRecord, EntityRecord, RawFieldMap, SceneDocument,
    SCENE_FORMAT_VERSION,
};
use super::references::{ReferenceResolver, ResolveContext};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("scene document has no entity record collection")]
    MissingRecordCollection,
    #[error("parse scene json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("unsupported scene format version {found} (newest supported is {supported})")]
    UnsupportedFormatVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingTemplatePolicy {
    #[default]
    Skip,
    Placeholder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildConfig {
    pub missing_template: MissingTemplatePolicy,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: SceneGraph,
    pub diagnostics: Vec<Diagnostic>,
}

struct Placed {
    record_index: usize,
    id: NodeId,
    order: i64,
    parent_id: Option<NodeId>,
}

impl Placed {
    fn sort_key(&self) -> (i64, usize) {
        (self.order, self.record_index)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SceneGraphBuilder<'a> {
    store: &'a PrefabStore,
    schemas: Option<&'a ComponentSchemas>,
    config: BuildConfig,
}

impl<'a> SceneGraphBuilder<'a> {
    pub fn new(store: &'a PrefabStore) -> Self {
        Self {
            store,
            schemas: None,
            config: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_schemas(mut self, schemas: &'a ComponentSchemas) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn build(
        &self,
        records: &[EntityRecord],
        references: &mut dyn ReferenceResolver,
    ) -> BuildOutcome {
        let indexed = records.iter().enumerate().collect::<Vec<_>>();
        self.build_indexed(&indexed, DiagnosticSink::new(), references)
    }

    pub fn build_document(
        &self,
        document: &SceneDocument,
        references: &mut dyn ReferenceResolver,
    ) -> Result<BuildOutcome, BuildError> {
        if document.format_version > SCENE_FORMAT_VERSION {
            return Err(BuildError::UnsupportedFormatVersion {
                found: document.format_version,
                supported: SCENE_FORMAT_VERSION,
            });
        }
        Ok(self.build(&document.entities, references))
    }

    pub fn build_json(
        &self,
        raw: &str,
        references: &mut dyn ReferenceResolver,
    ) -> Result<BuildOutcome, BuildError> {
        let mut diagnostics = DiagnosticSink::new();
        let records = parse_scene_json(raw, &mut diagnostics)?;
        let indexed = records
            .iter()
            .map(|(index, record)| (*index, record))
            .collect::<Vec<_>>();
        Ok(self.build_indexed(&indexed, diagnostics, references))
    }

    fn build_indexed(
        &self,
        records: &[(usize, &EntityRecord)],
        mut diagnostics: DiagnosticSink,
        references: &mut dyn ReferenceResolver,
    ) -> BuildOutcome {
        let mut nodes = HashMap::with_capacity(records.len());
        let mut hierarchy = HierarchyIndex::new();
        let mut placed = Vec::with_capacity(records.len());

        for &(record_index, record) in records {
            let Some(node) = self.instantiate(record_index, record, &nodes, &mut diagnostics)
            else {
                continue;
            };
            let id = node.id().clone();
            hierarchy.insert(id.clone());
            placed.push(Placed {
                record_index,
                id: id.clone(),
                order: record.order,
                parent_id: record
                    .parent_id
                    .as_deref()
                    .filter(|parent| !parent.is_empty())
                    .map(NodeId::from),
            });
            nodes.insert(id, node);
        }

        let mut wiring = placed
            .iter()
            .filter(|entry| entry.parent_id.is_some())
            .collect::<Vec<_>>();
        wiring.sort_by_key(|entry| entry.sort_key());

        let mut dangling_parents = HashMap::new();
        for entry in wiring {
            let Some(parent) = &entry.parent_id else {
                continue;
            };
            if !nodes.contains_key(parent) {
                diagnostics.report(
                    Diagnostic::new(
                        DiagnosticKind::DanglingParentReference,
                        format!("parent '{parent}' is not in this scene; promoted to root"),
                    )
                    .at_record(entry.record_index)
                    .for_node(&entry.id),
                );
                dangling_parents.insert(entry.id.clone(), parent.clone());
                continue;
            }
            if let Err(error) = hierarchy.set_parent(&entry.id, Some(parent)) {
                diagnostics.report(
                    Diagnostic::new(
                        DiagnosticKind::IllegalReparent,
                        format!("{error}; kept as root"),
                    )
                    .at_record(entry.record_index)
                    .for_node(&entry.id),
                );
            }
        }

        let mut graph = SceneGraph::from_parts(nodes, hierarchy, dangling_parents);

        let context = ResolveContext::new(&graph, self.store);
        for entry in &placed {
            if let Some(node) = graph.node(&entry.id) {
                references.resolve(node, &context, &mut diagnostics);
            }
        }

        let mut roots = placed
            .iter()
            .filter(|entry| graph.parent(&entry.id).is_none())
            .collect::<Vec<_>>();
        roots.sort_by_key(|entry| entry.sort_key());
        let roots = roots
            .into_iter()
            .map(|entry| entry.id.clone())
            .collect::<Vec<_>>();
        graph.attach_roots(roots);

        info!(
            records = records.len(),
            nodes = graph.len(),
            roots = graph.roots().len(),
            diagnostics = diagnostics.len(),
            "scene_build_summary"
        );
        BuildOutcome {
            graph,
            diagnostics: diagnostics.into_vec(),
        }
    }

    fn instantiate(
        &self,
        record_index: usize,
        record: &EntityRecord,
        existing: &HashMap<NodeId, EntityNode>,
        diagnostics: &mut DiagnosticSink,
    ) -> Option<EntityNode> {
        if record.id.trim().is_empty() {
            diagnostics.report(
                Diagnostic::new(DiagnosticKind::MalformedRecord, "record has an empty id")
                    .at_record(record_index),
            );
            return None;
        }
        let id = NodeId::new(record.id.as_str());
        if existing.contains_key(&id) {
            diagnostics.report(
                Diagnostic::new(
                    DiagnosticKind::DuplicateNodeId,
                    format!("id '{id}' already used by an earlier record; skipped"),
                )
                .at_record(record_index)
                .for_node(&id),
            );
            return None;
        }

        let report = |diagnostics: &mut DiagnosticSink, kind, message: String| {
            diagnostics.report(
                Diagnostic::new(kind, message)
                    .at_record(record_index)
                    .for_node(&id),
            );
        };

        let prefab_id = record
            .prefab_id
            .as_deref()
            .filter(|prefab_id| !prefab_id.is_empty());
        let data = match prefab_id {
            None => {
                if record.overrides.as_ref().is_some_and(|overrides| !overrides.is_empty()) {
                    report(
                        diagnostics,
                        DiagnosticKind::MalformedRecord,
                        "scratch record carries overrides; ignored".to_string(),
                    );
                }
                let mut components = Vec::new();
                for component in record.components.as_deref().unwrap_or_default() {
                    match self.convert_component(component) {
                        Ok(converted) => components.push(converted),
                        Err(message) => {
                            report(diagnostics, DiagnosticKind::FieldConversionFailure, message)
                        }
                    }
                }
                NodeData::Scratch { components }
            }
            Some(prefab_id) => {
                if record.components.as_ref().is_some_and(|components| !components.is_empty()) {
                    report(
                        diagnostics,
                        DiagnosticKind::MalformedRecord,
                        "prefab instance carries components; ignored".to_string(),
                    );
                }
                if !self.store.contains(prefab_id) {
                    match self.config.missing_template {
                        MissingTemplatePolicy::Skip => {
                            report(
                                diagnostics,
                                DiagnosticKind::MissingTemplate,
                                format!("prefab '{prefab_id}' is not in the store; record skipped"),
                            );
                            return None;
                        }
                        MissingTemplatePolicy::Placeholder => report(
                            diagnostics,
                            DiagnosticKind::MissingTemplate,
                            format!("prefab '{prefab_id}' is not in the store; kept as placeholder"),
                        ),
                    }
                }

                let mut overrides = OverrideMap::new();
                let raw_overrides = record.overrides.iter().flatten();
                for (component_type, raw_fields) in raw_overrides {
                    match self.convert_overrides(prefab_id, component_type, raw_fields) {
                        Ok(fields) if fields.is_empty() => {}
                        Ok(fields) => {
                            overrides.insert(component_type.clone(), fields);
                        }
                        Err(message) => {
                            report(diagnostics, DiagnosticKind::FieldConversionFailure, message)
                        }
                    }
                }
                NodeData::Instance {
                    prefab_id: prefab_id.to_string(),
                    overrides,
                }
            }
        };

        let mut node = EntityNode::new(id.clone(), record.name.as_str(), data)
            .with_position(Vec3::from(record.position));
        node.set_order(record.order);
        debug!(node = %id, record_index, prefab = ?node.prefab_id(), "scene_node_instantiated");
        Some(node)
    }

    fn convert_component(&self, component: &ComponentRecord) -> Result<Component, String> {
        let fields = convert_fields(&component.component_type, &component.fields, |field| {
            self.schemas
                .and_then(|schemas| schemas.field_kind(&component.component_type, field))
        })?;
        Ok(Component {
            component_type: component.component_type.clone(),
            fields,
        })
    }

    fn convert_overrides(
        &self,
        prefab_id: &str,
        component_type: &str,
        raw_fields: &RawFieldMap,
    ) -> Result<FieldMap, String> {
        convert_fields(component_type, raw_fields, |field| {
            self.store
                .field_default(prefab_id, component_type, field)
                .map(Value::kind)
                .or_else(|| {
                    self.schemas
                        .and_then(|schemas| schemas.field_kind(component_type, field))
                })
        })
    }
}

fn convert_fields(
    component_type: &str,
    raw_fields: &RawFieldMap,
    declared_kind: impl Fn(&str) -> Option<FieldKind>,
) -> Result<FieldMap, String> {
    let mut fields = FieldMap::new();
    for (name, raw) in raw_fields {
        let value = Value::from_json(raw, declared_kind(name.as_str())).map_err(|error| {
            format!("component '{component_type}' dropped: field '{name}': {error}")
        })?;
        fields.insert(name.clone(), value);
    }
    Ok(fields)
}
