//! Template context structures
//!
//! Flattens a [`MappingDocument`] into the views the XML template iterates.

use crate::document::{AttributeMapping, ClientProperty, FeatureTypeMapping, MappingDocument};
use serde::Serialize;

/// Context for document template rendering
#[derive(Debug, Clone, Serialize)]
pub struct DocumentContext {
    pub namespaces: Vec<NamespaceView>,
    pub type_mappings: Vec<TypeMappingView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceView {
    pub prefix: String,
    pub uri: String,
}

/// View of a feature type mapping
#[derive(Debug, Clone, Serialize)]
pub struct TypeMappingView {
    pub source_type: String,
    pub target_element: String,
    pub attributes: Vec<AttributeView>,
}

/// View of an attribute mapping
///
/// `link_element` and `link_field` are only set together, so the
/// template can test either.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeView {
    pub target_attribute: String,
    pub target_attribute_node: Option<String>,
    pub source_expression: Option<String>,
    pub id_expression: Option<String>,
    pub is_multiple: bool,
    pub link_element: Option<String>,
    pub link_field: Option<String>,
    pub client_properties: Vec<ClientPropertyView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientPropertyView {
    pub name: String,
    pub value: String,
}

impl DocumentContext {
    pub fn from_document(document: &MappingDocument) -> Self {
        Self {
            namespaces: document
                .namespaces
                .iter()
                .map(|ns| NamespaceView {
                    prefix: ns.prefix.clone(),
                    uri: ns.uri.clone(),
                })
                .collect(),
            type_mappings: document
                .type_mappings
                .iter()
                .map(TypeMappingView::from_mapping)
                .collect(),
        }
    }
}

impl TypeMappingView {
    fn from_mapping(mapping: &FeatureTypeMapping) -> Self {
        Self {
            source_type: mapping.source_type.clone(),
            target_element: mapping.target_element.clone(),
            attributes: mapping
                .attribute_mappings
                .iter()
                .map(AttributeView::from_attribute)
                .collect(),
        }
    }
}

impl AttributeView {
    fn from_attribute(attr: &AttributeMapping) -> Self {
        let (link_element, link_field) = match (&attr.link_element, &attr.link_field) {
            (Some(element), Some(field)) => (Some(element.clone()), Some(field.clone())),
            _ => (None, None),
        };
        Self {
            target_attribute: attr.target_attribute.clone(),
            target_attribute_node: attr.target_attribute_node.clone(),
            source_expression: attr.source_expression.clone(),
            id_expression: attr.id_expression.clone(),
            is_multiple: attr.is_multiple,
            link_element,
            link_field,
            client_properties: attr
                .client_properties
                .iter()
                .map(|p: &ClientProperty| ClientPropertyView {
                    name: p.name.clone(),
                    value: p.value.clone(),
                })
                .collect(),
        }
    }
}
