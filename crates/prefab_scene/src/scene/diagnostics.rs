use std::fmt;

use tracing::warn;

use super::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    MissingTemplate,
    FieldConversionFailure,
    DanglingParentReference,
    IllegalReparent,
    DuplicateNodeId,
    MalformedRecord,
    UnresolvedReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub record_index: Option<usize>,
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            record_index: None,
            node_id: None,
            message: message.into(),
        }
    }

    pub fn at_record(mut self, record_index: usize) -> Self {
        self.record_index = Some(record_index);
        self
    }

    pub fn for_node(mut self, node_id: &NodeId) -> Self {
        self.node_id = Some(node_id.clone());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        match (&self.node_id, self.record_index) {
            (Some(node_id), Some(index)) => write!(f, " (node={node_id}, record={index})"),
            (Some(node_id), None) => write!(f, " (node={node_id})"),
            (None, Some(index)) => write!(f, " (record={index})"),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        warn!(
            kind = ?diagnostic.kind,
            record_index = ?diagnostic.record_index,
            node_id = ?diagnostic.node_id.as_ref().map(NodeId::as_str),
            message = %diagnostic.message,
            "scene_diagnostic"
        );
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
