use std::io::{self, Write};
use std::path::PathBuf;

use prefab_scene::scene::TemplateLink;
use prefab_scene::{
    graph_fingerprint, load_prefab_defs, load_scene_file, save_scene_document, BuildConfig,
    BuildOutcome, ComponentSchemas, EntityLinkResolver, MissingTemplatePolicy, OverrideResolver,
    PrefabStore, SceneGraphBuilder,
};
use tracing::info;

pub const DEFS_DIR_ENV_VAR: &str = "PREFAB_SCENE_DEFS_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectOptions {
    pub defs_dir: Option<PathBuf>,
    pub scene_path: PathBuf,
    pub placeholder_missing: bool,
    pub link_slots: Vec<(String, String)>,
    pub out_path: Option<PathBuf>,
}

pub fn parse_link_slot(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('.') {
        Some((component, field)) if !component.is_empty() && !field.is_empty() => {
            Ok((component.to_string(), field.to_string()))
        }
        _ => Err(format!(
            "invalid --link value '{raw}' (expected Component.field)"
        )),
    }
}

pub fn run(options: &InspectOptions, out: &mut impl Write) -> Result<(), String> {
    let store = match &options.defs_dir {
        Some(dir) => load_prefab_defs(dir).map_err(|error| error.to_string())?,
        None => PrefabStore::new(),
    };
    let mut schemas = ComponentSchemas::new();
    schemas.extend_from_store(&store);

    let config = BuildConfig {
        missing_template: if options.placeholder_missing {
            MissingTemplatePolicy::Placeholder
        } else {
            MissingTemplatePolicy::Skip
        },
    };
    let builder = SceneGraphBuilder::new(&store)
        .with_schemas(&schemas)
        .with_config(config);

    let mut links = EntityLinkResolver::new();
    for (component_type, field) in &options.link_slots {
        links.add_slot(component_type.as_str(), field.as_str());
    }

    let outcome = load_scene_file(&options.scene_path, &builder, &mut links)
        .map_err(|error| error.to_string())?;
    write_report(&outcome, &store, &links, out)
        .map_err(|error| format!("write report: {error}"))?;

    if let Some(path) = &options.out_path {
        save_scene_document(path, &outcome.graph).map_err(|error| error.to_string())?;
        writeln!(out, "saved: {}", path.display())
            .map_err(|error| format!("write report: {error}"))?;
    }
    info!(
        nodes = outcome.graph.len(),
        diagnostics = outcome.diagnostics.len(),
        "scene_inspect_finished"
    );
    Ok(())
}

fn write_report(
    outcome: &BuildOutcome,
    store: &PrefabStore,
    links: &EntityLinkResolver,
    out: &mut impl Write,
) -> io::Result<()> {
    let graph = &outcome.graph;
    let resolver = OverrideResolver::new(store);
    writeln!(
        out,
        "scene: {} nodes, {} roots, {} templates",
        graph.len(),
        graph.roots().len(),
        store.len()
    )?;

    for (depth, node) in graph.iter_depth_first() {
        let indent = "  ".repeat(depth);
        let source = match (resolver.template_link(node), node.prefab_id()) {
            (TemplateLink::Valid, Some(prefab_id)) => format!("prefab {prefab_id}"),
            (TemplateLink::Missing, Some(prefab_id)) => format!("prefab {prefab_id} (missing)"),
            _ => "scratch".to_string(),
        };
        writeln!(out, "{indent}- {} {:?} [{source}]", node.id(), node.name)?;
        for component in resolver.effective_components(node) {
            writeln!(out, "{indent}    {}", component.component_type)?;
            for (name, value) in &component.fields {
                // `*` marks fields that differ from the template default.
                let marker =
                    if resolver.is_field_overridden(node, &component.component_type, name) {
                        '*'
                    } else {
                        ' '
                    };
                writeln!(out, "{indent}     {marker}{name} = {value}")?;
            }
        }
    }

    for (source, component_type, field, target) in links.links() {
        writeln!(out, "link: {source} {component_type}.{field} -> {target}")?;
    }

    writeln!(out, "diagnostics: {}", outcome.diagnostics.len())?;
    for diagnostic in &outcome.diagnostics {
        writeln!(out, "  {diagnostic}")?;
    }
    writeln!(out, "fingerprint: {}", graph_fingerprint(graph, store))
}
