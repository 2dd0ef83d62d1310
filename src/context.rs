//! Mapping context - the shared compiler state
//!
//! One context lives for exactly one compilation. Handlers receive it
//! explicitly and only ever extend it through idempotent get-or-create
//! operations, so the order in which cells arrive does not change the
//! result beyond what the alignment itself dictates.
//!
//! Three registries are kept:
//!
//! - **namespaces**: URI -> unique prefix
//! - **type mappings**: target type -> [`FeatureTypeMapping`], whose
//!   attribute mappings are addressed by an owner key (the rendered path
//!   of the element they describe)
//! - **links**: (container, nested) target type pairs already chained,
//!   with their link element and link field

use crate::alignment::Alignment;
use crate::config::{is_ncname, CompilerConfig};
use crate::document::{AttributeMapping, FeatureTypeMapping, MappingDocument, Namespace};
use crate::error::{Error, Result};
use crate::path::PathSegment;
use crate::schema::{QName, SchemaIndex};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A feature-chaining link between two target feature types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLink {
    pub container: QName,
    pub nested: QName,
    /// Rendered element name of the nested type
    pub link_element: String,
    /// Shared key field, e.g. `FEATURE_LINK[1]`
    pub link_field: String,
}

#[derive(Debug)]
struct TypeMappingEntry {
    target_type: QName,
    mapping: FeatureTypeMapping,
    owners: HashMap<String, usize>,
}

/// Shared state of one compilation
#[derive(Debug)]
pub struct MappingContext<'a> {
    source: &'a SchemaIndex,
    target: &'a SchemaIndex,
    alignment: Option<&'a Alignment>,
    config: &'a CompilerConfig,
    namespaces: Vec<Namespace>,
    type_mappings: Vec<TypeMappingEntry>,
    type_lookup: HashMap<QName, usize>,
    links: Vec<FeatureLink>,
    warnings: Vec<String>,
}

impl<'a> MappingContext<'a> {
    pub fn new(
        source: &'a SchemaIndex,
        target: &'a SchemaIndex,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            source,
            target,
            alignment: None,
            config,
            namespaces: vec![],
            type_mappings: vec![],
            type_lookup: HashMap::new(),
            links: vec![],
            warnings: vec![],
        }
    }

    /// Attach the alignment being compiled (needed to plan joins)
    pub fn with_alignment(mut self, alignment: &'a Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn source(&self) -> &'a SchemaIndex {
        self.source
    }

    pub fn target(&self) -> &'a SchemaIndex {
        self.target
    }

    pub fn alignment(&self) -> Option<&'a Alignment> {
        self.alignment
    }

    pub fn config(&self) -> &'a CompilerConfig {
        self.config
    }

    // ---------------------------------------------------------------
    // Namespaces
    // ---------------------------------------------------------------

    /// Prefix for `uri`; the same URI always yields the same prefix
    pub fn get_or_create_namespace(&mut self, uri: &str, preferred: Option<&str>) -> String {
        if uri.is_empty() {
            return String::new();
        }
        if let Some(ns) = self.namespaces.iter().find(|n| n.uri == uri) {
            return ns.prefix.clone();
        }

        let candidates = [
            preferred,
            self.config.preferred_prefix(uri),
            self.target.prefix_hint(uri),
            self.source.prefix_hint(uri),
        ];
        let chosen = candidates
            .into_iter()
            .flatten()
            .find(|p| is_ncname(p) && !self.prefix_taken(p))
            .map(|p| p.to_string())
            .unwrap_or_else(|| self.generated_prefix());

        debug!(uri, prefix = %chosen, "registered namespace");
        self.namespaces.push(Namespace {
            prefix: chosen.clone(),
            uri: uri.to_string(),
        });
        chosen
    }

    fn prefix_taken(&self, prefix: &str) -> bool {
        self.namespaces.iter().any(|n| n.prefix == prefix)
    }

    fn generated_prefix(&self) -> String {
        (1..)
            .map(|n| format!("ns{}", n))
            .find(|p| !self.prefix_taken(p))
            .unwrap_or_default()
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// `prefix:local`, or bare `local` when unqualified
    pub fn render_qname(&mut self, name: &QName) -> String {
        let prefix = self.get_or_create_namespace(name.namespace(), None);
        if prefix.is_empty() {
            name.local_name().to_string()
        } else {
            format!("{}:{}", prefix, name.local_name())
        }
    }

    /// `/`-joined rendering; a 0-based index `i` renders as `[i+1]`
    pub fn render_path(&mut self, segments: &[PathSegment]) -> String {
        segments
            .iter()
            .map(|s| {
                let name = self.render_qname(&s.name);
                match s.index {
                    Some(i) => format!("{}[{}]", name, i + 1),
                    None => name,
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Rendered element name of a target type
    pub fn target_element_name(&mut self, target_type: &QName) -> Result<String> {
        let element = self.target.require(target_type)?.element_name().clone();
        Ok(self.render_qname(&element))
    }

    // ---------------------------------------------------------------
    // Type mappings
    // ---------------------------------------------------------------

    /// Mapping for `target_type`, created on first request
    pub fn get_or_create_feature_type_mapping(
        &mut self,
        target_type: &QName,
        source_type: &QName,
    ) -> Result<&FeatureTypeMapping> {
        let slot = self.type_slot(target_type, source_type)?;
        Ok(&self.type_mappings[slot].mapping)
    }

    fn type_slot(&mut self, target_type: &QName, source_type: &QName) -> Result<usize> {
        if let Some(&slot) = self.type_lookup.get(target_type) {
            return Ok(slot);
        }
        let target_element = self.target_element_name(target_type)?;
        let mapping = FeatureTypeMapping::new(source_type.local_name(), &target_element);
        debug!(
            source_type = %mapping.source_type,
            target_element = %mapping.target_element,
            "created feature type mapping"
        );
        let slot = self.type_mappings.len();
        self.type_mappings.push(TypeMappingEntry {
            target_type: target_type.clone(),
            mapping,
            owners: HashMap::new(),
        });
        self.type_lookup.insert(target_type.clone(), slot);
        Ok(slot)
    }

    pub fn feature_type_mapping(&self, target_type: &QName) -> Option<&FeatureTypeMapping> {
        self.type_lookup
            .get(target_type)
            .map(|&slot| &self.type_mappings[slot].mapping)
    }

    pub fn has_feature_type_mapping(&self, target_type: &QName) -> bool {
        self.type_lookup.contains_key(target_type)
    }

    /// Attribute mapping of `target_type` owned by `owner_key`, created on first request
    ///
    /// A new mapping starts with `target_attribute = owner_key`.
    pub fn upsert_attribute(
        &mut self,
        target_type: &QName,
        owner_key: &str,
    ) -> Result<&mut AttributeMapping> {
        let slot = *self.type_lookup.get(target_type).ok_or_else(|| {
            Error::Other(format!("no feature type mapping for {}", target_type))
        })?;
        let entry = &mut self.type_mappings[slot];
        let index = match entry.owners.get(owner_key) {
            Some(&index) => index,
            None => {
                let index = entry.mapping.attribute_mappings.len();
                entry
                    .mapping
                    .attribute_mappings
                    .push(AttributeMapping::new(owner_key));
                entry.owners.insert(owner_key.to_string(), index);
                index
            }
        };
        Ok(&mut entry.mapping.attribute_mappings[index])
    }

    pub fn attribute(&self, target_type: &QName, owner_key: &str) -> Option<&AttributeMapping> {
        let entry = &self.type_mappings[*self.type_lookup.get(target_type)?];
        let index = *entry.owners.get(owner_key)?;
        entry.mapping.attribute_mappings.get(index)
    }

    // ---------------------------------------------------------------
    // Feature links
    // ---------------------------------------------------------------

    /// Link names for a (container, nested) pair; repeated calls return the same link
    pub fn register_link(&mut self, container: &QName, nested: &QName) -> Result<FeatureLink> {
        if let Some(link) = self.link(container, nested) {
            return Ok(link.clone());
        }
        let link = FeatureLink {
            container: container.clone(),
            nested: nested.clone(),
            link_element: self.target_element_name(nested)?,
            link_field: self.config.link_field(self.links.len() + 1),
        };
        debug!(
            container = %container,
            nested = %nested,
            link_field = %link.link_field,
            "registered feature link"
        );
        self.links.push(link.clone());
        Ok(link)
    }

    pub fn link(&self, container: &QName, nested: &QName) -> Option<&FeatureLink> {
        self.links
            .iter()
            .find(|l| &l.container == container && &l.nested == nested)
    }

    pub fn links(&self) -> &[FeatureLink] {
        &self.links
    }

    // ---------------------------------------------------------------
    // Diagnostics and output
    // ---------------------------------------------------------------

    /// Record a non-fatal diagnostic
    pub fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Snapshot of the document built so far
    pub fn document(&self) -> MappingDocument {
        MappingDocument {
            namespaces: self.namespaces.clone(),
            type_mappings: self
                .type_mappings
                .iter()
                .map(|e| e.mapping.clone())
                .collect(),
        }
    }

    /// Finish the compilation, yielding the document and collected warnings
    pub fn into_document(self) -> (MappingDocument, Vec<String>) {
        let document = MappingDocument {
            namespaces: self.namespaces,
            type_mappings: self.type_mappings.into_iter().map(|e| e.mapping).collect(),
        };
        (document, self.warnings)
    }

    /// Target types with a mapping, in creation order
    pub fn mapped_types(&self) -> Vec<&QName> {
        self.type_mappings.iter().map(|e| &e.target_type).collect()
    }
}
