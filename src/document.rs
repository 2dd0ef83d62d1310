//! Mapping document - the compiled output
//!
//! A namespace table plus one [`FeatureTypeMapping`] per target feature
//! type. Field names serialize in camelCase so JSON and YAML output match
//! the element names of the XML rendering.

use crate::config::OutputFormat;
use crate::error::Result;
use crate::templates;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The compiled mapping document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappingDocument {
    /// Prefix table, each prefix unique
    pub namespaces: Vec<Namespace>,

    /// Type mappings in creation order
    pub type_mappings: Vec<FeatureTypeMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// Mapping of one source type onto one target element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureTypeMapping {
    pub source_type: String,
    pub target_element: String,
    #[serde(default)]
    pub attribute_mappings: Vec<AttributeMapping>,
}

/// One target attribute and how to compute it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMapping {
    pub target_attribute: String,

    /// Concrete substitution type when the path goes through an abstract element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_attribute_node: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_expression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_expression: Option<String>,

    #[serde(default)]
    pub is_multiple: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_element: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_field: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_properties: Vec<ClientProperty>,
}

/// XML-attribute decoration on a target element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClientProperty {
    pub name: String,
    pub value: String,
}

impl AttributeMapping {
    pub fn new(target_attribute: &str) -> Self {
        Self {
            target_attribute: target_attribute.to_string(),
            ..Default::default()
        }
    }

    pub fn client_property(&self, name: &str) -> Option<&str> {
        self.client_properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Set a client property, replacing an existing one of the same name in place
    pub fn set_client_property(&mut self, name: &str, value: &str) {
        match self.client_properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self.client_properties.push(ClientProperty {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.link_field.is_some()
    }
}

impl FeatureTypeMapping {
    pub fn new(source_type: &str, target_element: &str) -> Self {
        Self {
            source_type: source_type.to_string(),
            target_element: target_element.to_string(),
            attribute_mappings: vec![],
        }
    }

    /// Attribute mapping by rendered target path
    pub fn attribute(&self, target_attribute: &str) -> Option<&AttributeMapping> {
        self.attribute_mappings
            .iter()
            .find(|a| a.target_attribute == target_attribute)
    }
}

impl MappingDocument {
    pub fn type_mapping(&self, target_element: &str) -> Option<&FeatureTypeMapping> {
        self.type_mappings
            .iter()
            .find(|m| m.target_element == target_element)
    }

    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|n| n.uri == uri)
            .map(|n| n.prefix.as_str())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_norway::to_string(self)?)
    }

    pub fn to_xml(&self) -> Result<String> {
        templates::render_document(self)
    }

    /// Render in the requested format
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Xml => self.to_xml(),
            OutputFormat::Json => self.to_json(),
            OutputFormat::Yaml => self.to_yaml(),
        }
    }

    /// Fingerprint over the canonical JSON form
    pub fn hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let content = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
    }
}
