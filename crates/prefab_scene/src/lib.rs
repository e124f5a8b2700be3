mod atomic_io;
pub mod component;
pub mod content;
pub mod scene;
pub mod value;

pub use component::{Component, ComponentSchemas, FieldMap};
pub use content::{
    load_prefab_defs, parse_prefab_defs, PrefabDefError, PrefabDefErrorCode, PrefabStore,
    PrefabStoreError, PrefabTemplate, SourceLocation,
};
pub use scene::{
    graph_fingerprint, load_scene_document, load_scene_file, save_scene_document, BuildConfig,
    BuildError, BuildOutcome, Diagnostic, DiagnosticKind, EditSession, EntityLinkResolver,
    EntityNode, EntityRecord, MissingTemplatePolicy, NoReferences, NodeData, NodeId,
    OverrideResolver, RecordEncodeError, ReferenceResolver, SceneDocument, SceneFileError,
    SceneGraph, SceneGraphBuilder, TemplateLink,
};
pub use value::{ConversionError, FieldKind, Value};
