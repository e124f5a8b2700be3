use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::component::Component;
use crate::value::{FieldKind, Value};

use super::store::PrefabStore;
use super::template::PrefabTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefabDefErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownElement,
    MissingAttribute,
    DuplicateComponent,
    DuplicateField,
    InvalidValue,
    DuplicateDefInFile,
}

#[derive(Debug, Clone)]
pub struct PrefabDefError {
    pub code: PrefabDefErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for PrefabDefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for PrefabDefError {}

pub fn load_prefab_defs(defs_dir: &Path) -> Result<PrefabStore, PrefabDefError> {
    let xml_files = collect_xml_files_sorted(defs_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut store = PrefabStore::new();
    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        for template in parse_prefab_defs(xml_file, &raw)? {
            let template_id = template.id().to_string();
            let replaced = store.publish_replacing(template).map_err(|error| PrefabDefError {
                code: PrefabDefErrorCode::InvalidValue,
                message: error.to_string(),
                file_path: xml_file.clone(),
                location: None,
            })?;
            if replaced {
                info!(
                    prefab_id = %template_id,
                    file = %xml_file.display(),
                    "prefab_def_replaced_by_later_file"
                );
            }
        }
    }

    info!(
        defs_dir = %defs_dir.display(),
        file_count = xml_files.len(),
        template_count = store.len(),
        "prefab_defs_loaded"
    );
    Ok(store)
}

pub fn parse_prefab_defs(
    file_path: &Path,
    raw: &str,
) -> Result<Vec<PrefabTemplate>, PrefabDefError> {
    let doc = Document::parse(raw).map_err(|error| PrefabDefError {
        code: PrefabDefErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = DocContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error_at(
            PrefabDefErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut seen_ids = HashSet::<String>::new();
    let mut templates = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "PrefabDef" {
            return Err(ctx.error_at(
                PrefabDefErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; expected <PrefabDef>",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        let template = parse_prefab_def(&ctx, child)?;
        if !seen_ids.insert(template.id().to_string()) {
            return Err(ctx.error_at(
                PrefabDefErrorCode::DuplicateDefInFile,
                format!("duplicate PrefabDef '{}' in one file", template.id()),
                child,
            ));
        }
        templates.push(template);
    }

    debug!(
        file = %file_path.display(),
        template_count = templates.len(),
        "prefab_def_file_parsed"
    );
    Ok(templates)
}

struct DocContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn error_at(
        &self,
        code: PrefabDefErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> PrefabDefError {
        let pos = self.doc.text_pos_at(node.range().start);
        PrefabDefError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_attribute(
        &self,
        node: Node<'_, '_>,
        attribute: &str,
    ) -> Result<String, PrefabDefError> {
        let value = node.attribute(attribute).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(self.error_at(
                PrefabDefErrorCode::MissingAttribute,
                format!(
                    "<{}> requires a non-empty '{}' attribute",
                    node.tag_name().name(),
                    attribute
                ),
                node,
            ));
        }
        Ok(value.to_string())
    }
}

fn parse_prefab_def(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PrefabTemplate, PrefabDefError> {
    let id = ctx.required_attribute(node, "id")?;
    let mut seen_types = HashSet::<String>::new();
    let mut components = Vec::new();

    for element in node.children().filter(|child| child.is_element()) {
        if element.tag_name().name() != "Component" {
            return Err(ctx.error_at(
                PrefabDefErrorCode::UnknownElement,
                format!(
                    "unknown element <{}> in <PrefabDef>",
                    element.tag_name().name()
                ),
                element,
            ));
        }
        let component = parse_component(ctx, element)?;
        if !seen_types.insert(component.component_type.clone()) {
            return Err(ctx.error_at(
                PrefabDefErrorCode::DuplicateComponent,
                format!(
                    "component '{}' declared twice in PrefabDef '{}'",
                    component.component_type, id
                ),
                element,
            ));
        }
        components.push(component);
    }

    Ok(PrefabTemplate::new(id, components))
}

fn parse_component(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Component, PrefabDefError> {
    let mut component = Component::new(ctx.required_attribute(node, "type")?);

    for field in node.children().filter(|child| child.is_element()) {
        if field.tag_name().name() != "Field" {
            return Err(ctx.error_at(
                PrefabDefErrorCode::UnknownElement,
                format!("unknown element <{}> in <Component>", field.tag_name().name()),
                field,
            ));
        }
        let name = ctx.required_attribute(field, "name")?;
        let kind_token = ctx.required_attribute(field, "kind")?;
        let Some(kind) = FieldKind::from_token(&kind_token) else {
            return Err(ctx.error_at(
                PrefabDefErrorCode::InvalidValue,
                format!(
                    "unknown field kind '{kind_token}'; allowed: bool, int, float, string, vec2, vec3, vec4, asset, enum"
                ),
                field,
            ));
        };
        let text = field.text().map(str::trim).unwrap_or_default();
        let value = Value::parse_text(kind, text).map_err(|error| {
            ctx.error_at(
                PrefabDefErrorCode::InvalidValue,
                format!("field '{name}': {error}"),
                field,
            )
        })?;
        if component.fields.contains_key(&name) {
            return Err(ctx.error_at(
                PrefabDefErrorCode::DuplicateField,
                format!(
                    "field '{}' declared twice in component '{}'",
                    name, component.component_type
                ),
                field,
            ));
        }
        component.fields.insert(name, value);
    }

    Ok(component)
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn read_error(path: PathBuf, source: std::io::Error) -> PrefabDefError {
    PrefabDefError {
        code: PrefabDefErrorCode::ReadFile,
        message: format!("failed to read prefab defs: {source}"),
        file_path: path,
        location: None,
    }
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            files.push((normalize_rel_path(rel), path.clone()));
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    #[test]
    fn parses_components_and_typed_defaults_in_order() {
        let templates = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs>
                <PrefabDef id="Torch">
                    <Component type="Transform">
                        <Field name="offset" kind="vec3">0 1.5 0</Field>
                    </Component>
                    <Component type="Light">
                        <Field name="radius" kind="float">4</Field>
                        <Field name="mode" kind="enum">Flicker</Field>
                        <Field name="cookie" kind="asset">textures/cookie.png</Field>
                        <Field name="enabled" kind="bool">true</Field>
                    </Component>
                </PrefabDef>
            </Defs>"#,
        )
        .expect("parse");

        assert_eq!(templates.len(), 1);
        let torch = &templates[0];
        assert_eq!(torch.id(), "Torch");
        let types = torch
            .components()
            .iter()
            .map(|component| component.component_type.as_str())
            .collect::<Vec<_>>();
        assert_eq!(types, vec!["Transform", "Light"]);
        assert_eq!(
            torch.field_default("Transform", "offset"),
            Some(&Value::Vec3([0.0, 1.5, 0.0]))
        );
        assert_eq!(
            torch.field_default("Light", "radius"),
            Some(&Value::Float(4.0))
        );
        assert_eq!(
            torch.field_default("Light", "mode"),
            Some(&Value::Enum("Flicker".to_string()))
        );
    }

    #[test]
    fn invalid_value_reports_location() {
        let err = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs><PrefabDef id="Goblin"><Component type="Stats"><Field name="hp" kind="int">ten</Field></Component></PrefabDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::InvalidValue);
        assert!(err.location.is_some());
    }

    #[test]
    fn missing_id_and_unknown_kind_error() {
        let err = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs><PrefabDef><Component type="Stats"/></PrefabDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::MissingAttribute);

        let err = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs><PrefabDef id="A"><Component type="Stats"><Field name="hp" kind="quaternion">1</Field></Component></PrefabDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::InvalidValue);
    }

    #[test]
    fn duplicate_component_and_field_error() {
        let err = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs><PrefabDef id="A"><Component type="Stats"/><Component type="Stats"/></PrefabDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::DuplicateComponent);

        let err = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs><PrefabDef id="A"><Component type="Stats"><Field name="hp" kind="int">1</Field><Field name="hp" kind="int">2</Field></Component></PrefabDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::DuplicateField);
    }

    #[test]
    fn wrong_root_and_malformed_xml_error() {
        let err = parse_prefab_defs(Path::new("defs.xml"), "<Things/>").expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::InvalidRoot);

        let err =
            parse_prefab_defs(Path::new("defs.xml"), "<Defs><PrefabDef id=\"A\"></Defs>")
                .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn duplicate_id_in_one_file_errors() {
        let err = parse_prefab_defs(
            Path::new("defs.xml"),
            r#"<Defs><PrefabDef id="A"/><PrefabDef id="A"/></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::DuplicateDefInFile);
    }

    #[test]
    fn directory_load_is_sorted_and_later_file_wins() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("a_base.xml"),
            r#"<Defs><PrefabDef id="Goblin"><Component type="Stats"><Field name="hp" kind="int">10</Field></Component></PrefabDef></Defs>"#,
        );
        write_file(
            &temp.path().join("nested").join("z_patch.xml"),
            r#"<Defs><PrefabDef id="Goblin"><Component type="Stats"><Field name="hp" kind="int">15</Field></Component></PrefabDef></Defs>"#,
        );
        write_file(&temp.path().join("notes.txt"), "ignored");

        let store = load_prefab_defs(temp.path()).expect("load");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.field_default("Goblin", "Stats", "hp"),
            Some(&Value::Int(15))
        );
    }

    #[test]
    fn missing_directory_is_read_error() {
        let temp = TempDir::new().expect("temp");
        let err = load_prefab_defs(&temp.path().join("absent")).expect_err("err");
        assert_eq!(err.code, PrefabDefErrorCode::ReadFile);
    }
}
