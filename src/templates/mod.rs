//! Template-based document rendering
//!
//! Uses MiniJinja templates for the XML form of the mapping document.
//! Templates are embedded by default; a directory holding
//! `documents/app_schema.jinja` can override the embedded one.

pub mod context;
pub mod filters;

use crate::document::MappingDocument;
use crate::error::{Error, Result};
use minijinja::Environment;
use std::path::Path;
use std::sync::OnceLock;

/// Name of the mapping document template
pub const DOCUMENT_TEMPLATE: &str = "documents/app_schema.jinja";

// Embedded templates (compiled into binary)
mod embedded {
    pub const APP_SCHEMA: &str = include_str!("../../templates/documents/app_schema.jinja");
}

/// Template engine singleton
static ENGINE: OnceLock<Environment<'static>> = OnceLock::new();

/// Initialize the template engine with embedded templates
fn init_engine() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);

    filters::register_filters(&mut env);

    env.add_template(DOCUMENT_TEMPLATE, embedded::APP_SCHEMA)
        .expect("Failed to load app-schema document template");

    env
}

/// Get the global template engine
pub fn engine() -> &'static Environment<'static> {
    ENGINE.get_or_init(init_engine)
}

/// Create a new template engine with custom template directory
///
/// Templates in `custom_dir` override embedded templates.
pub fn engine_with_override(custom_dir: &Path) -> Result<Environment<'static>> {
    let mut env = init_engine();

    let path = custom_dir.join(DOCUMENT_TEMPLATE);
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        // Leaked once per engine; engines are built at startup
        let content: &'static str = Box::leak(content.into_boxed_str());
        env.add_template(DOCUMENT_TEMPLATE, content)
            .map_err(|e| Error::Template(format!("{}: {}", path.display(), e)))?;
    }

    Ok(env)
}

/// Render a mapping document as app-schema XML
pub fn render_document(document: &MappingDocument) -> Result<String> {
    render_document_with(engine(), document)
}

/// Render with a specific engine, e.g. one from [`engine_with_override`]
pub fn render_document_with(env: &Environment<'_>, document: &MappingDocument) -> Result<String> {
    let template = env
        .get_template(DOCUMENT_TEMPLATE)
        .map_err(|e| Error::Template(e.to_string()))?;
    let ctx = context::DocumentContext::from_document(document);
    template
        .render(&ctx)
        .map_err(|e| Error::Template(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AttributeMapping, FeatureTypeMapping, Namespace};

    fn sample_document() -> MappingDocument {
        let mut geometry = AttributeMapping::new("lcv:geometry");
        geometry.target_attribute_node = Some("gml:MultiSurfaceType".into());
        geometry.source_expression = Some("geom".into());
        geometry.id_expression = Some("strConcat('geom.', unit_id)".into());

        let mut member = AttributeMapping::new("lcv:member");
        member.source_expression = Some("dataset_id".into());
        member.link_element = Some("lcv:LandCoverUnit".into());
        member.link_field = Some("FEATURE_LINK[1]".into());
        member.is_multiple = true;
        member.set_client_property("xlink:href", "unit_id");

        let mut unit = FeatureTypeMapping::new("landcover", "lcv:LandCoverUnit");
        unit.attribute_mappings.push(geometry);
        let mut dataset = FeatureTypeMapping::new("dataset", "lcv:LandCoverDataset");
        dataset.attribute_mappings.push(member);

        MappingDocument {
            namespaces: vec![Namespace {
                prefix: "lcv".into(),
                uri: "http://inspire.ec.europa.eu/schemas/lcv/3.0".into(),
            }],
            type_mappings: vec![unit, dataset],
        }
    }

    #[test]
    fn test_engine_initialization() {
        assert!(engine().get_template(DOCUMENT_TEMPLATE).is_ok());
    }

    #[test]
    fn test_render_document() {
        let xml = render_document(&sample_document()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<prefix>lcv</prefix>"));
        assert!(xml.contains("<targetElement>lcv:LandCoverUnit</targetElement>"));
        assert!(xml.contains("<targetAttributeNode>gml:MultiSurfaceType</targetAttributeNode>"));
        assert!(xml.contains("<OCQL>strConcat(&apos;geom.&apos;, unit_id)</OCQL>"));
        assert!(xml.contains("<linkElement>lcv:LandCoverUnit</linkElement>"));
        assert!(xml.contains("<linkField>FEATURE_LINK[1]</linkField>"));
        assert!(xml.contains("<isMultiple>true</isMultiple>"));
        assert!(xml.contains("<name>xlink:href</name>"));
        assert!(!xml.contains("{%"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let doc = sample_document();
        assert_eq!(render_document(&doc).unwrap(), render_document(&doc).unwrap());
    }

    #[test]
    fn test_override_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(
            path.join("app_schema.jinja"),
            "{% for m in type_mappings %}{{ m.target_element }};{% endfor %}",
        )
        .unwrap();

        let env = engine_with_override(dir.path()).unwrap();
        let out = render_document_with(&env, &sample_document()).unwrap();
        assert_eq!(out, "lcv:LandCoverUnit;lcv:LandCoverDataset;");
    }
}
