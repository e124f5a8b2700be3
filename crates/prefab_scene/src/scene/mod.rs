mod builder;
mod diagnostics;
mod graph;
mod hierarchy;
mod node;
mod overrides;
mod record;
mod references;
mod serialize;
mod session;

pub use builder::{
    BuildConfig, BuildError, BuildOutcome, MissingTemplatePolicy, SceneGraphBuilder,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
pub use graph::{DepthFirst, GraphError, SceneGraph};
pub use hierarchy::{Ancestors, HierarchyIndex, ReparentError};
pub use node::{EntityNode, NodeData, NodeId, NodeIdAllocator, OverrideMap, Vec3};
pub use overrides::{values_equal, OverrideResolver, TemplateLink};
pub use record::{
    parse_scene_json, ComponentRecord, EntityRecord, IndexedRecords, RawFieldMap, SceneDocument,
    SCENE_FORMAT_VERSION,
};
pub use references::{EntityLinkResolver, NoReferences, ReferenceResolver, ResolveContext};
pub use serialize::{
    graph_fingerprint, load_scene_document, load_scene_file, save_scene_document,
    RecordEncodeError, SceneFileError,
};
pub use session::EditSession;
