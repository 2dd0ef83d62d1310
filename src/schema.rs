//! Schema trees, the read-only input model
//!
//! Source and target schemas are produced by external schema readers and
//! consumed here as nested child-definition graphs. A type owns an ordered
//! list of children; a child is either a property (element or XML attribute,
//! bound to a type by name) or a group (sequence or choice) whose children
//! are inlined.
//!
//! ## Example Schema
//!
//! ```yaml
//! prefixes:
//!   lcv: http://inspire.ec.europa.eu/schemas/lcv/3.0
//! types:
//!   - name: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}LandCoverUnitType"
//!     element: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}LandCoverUnit"
//!     feature_type: true
//!     children:
//!       - kind: property
//!         name: "{http://www.opengis.net/gml/3.2}id"
//!         attribute: true
//!       - kind: property
//!         name: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}geometry"
//!         type: "{http://www.opengis.net/gml/3.2}GeometryPropertyType"
//! ```

use crate::error::{Error, Result};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GML 3.2 namespace
pub const GML_NS: &str = "http://www.opengis.net/gml/3.2";
/// GML 3.1 namespace
pub const GML_31_NS: &str = "http://www.opengis.net/gml";
/// XLink namespace
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Qualified name in Clark notation: `{namespace}local`, or bare `local`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct QName(String);

impl QName {
    pub fn new(namespace: &str, local: &str) -> Self {
        if namespace.is_empty() {
            QName(local.to_string())
        } else {
            QName(format!("{{{}}}{}", namespace, local))
        }
    }

    /// Name without a namespace
    pub fn unqualified(local: &str) -> Self {
        QName(local.to_string())
    }

    pub fn namespace(&self) -> &str {
        match self.split() {
            Some((ns, _)) => ns,
            None => "",
        }
    }

    pub fn local_name(&self) -> &str {
        match self.split() {
            Some((_, local)) => local,
            None => &self.0,
        }
    }

    pub fn is_qualified(&self) -> bool {
        !self.namespace().is_empty()
    }

    fn split(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix('{')?;
        rest.split_once('}')
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for QName {
    fn from(s: &str) -> Self {
        QName(s.to_string())
    }
}

/// True for the `gml:id` attribute of any GML version
pub fn is_gml_id(name: &QName) -> bool {
    name.local_name() == "id" && is_gml_namespace(name.namespace())
}

pub fn is_gml_namespace(uri: &str) -> bool {
    matches!(uri, GML_NS | GML_31_NS)
}

/// A complete schema as produced by a schema reader
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    /// Prefix hints (prefix -> namespace URI)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prefixes: BTreeMap<String, String>,

    /// Type definitions
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
}

/// A named type with its ordered children
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypeDefinition {
    /// Type name
    pub name: QName,

    /// Global element declared with this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<QName>,

    /// Whether this is a feature type (a type-mapping boundary)
    #[serde(default)]
    pub feature_type: bool,

    /// Whether this is a geometry type
    #[serde(default)]
    pub geometry: bool,

    /// Child definitions in document order
    #[serde(default)]
    pub children: Vec<ChildDefinition>,
}

impl TypeDefinition {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            element: None,
            feature_type: false,
            geometry: false,
            children: vec![],
        }
    }

    /// Element used to emit instances of this type
    pub fn element_name(&self) -> &QName {
        self.element.as_ref().unwrap_or(&self.name)
    }
}

/// A child of a type or group
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChildDefinition {
    Property(PropertyDefinition),
    Group(GroupDefinition),
}

impl ChildDefinition {
    pub fn name(&self) -> &QName {
        match self {
            ChildDefinition::Property(p) => &p.name,
            ChildDefinition::Group(g) => &g.name,
        }
    }
}

/// An element or XML attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PropertyDefinition {
    pub name: QName,

    /// Property type; absent for simple content
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<QName>,

    /// maxOccurs > 1
    #[serde(default)]
    pub repeatable: bool,

    /// XML attribute rather than element
    #[serde(default)]
    pub attribute: bool,
}

/// A sequence or choice group
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GroupDefinition {
    pub name: QName,

    #[serde(default)]
    pub choice: bool,

    #[serde(default)]
    pub repeatable: bool,

    /// Abstract head element this choice substitutes (e.g. gml:AbstractGeometry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution_head: Option<QName>,

    #[serde(default)]
    pub children: Vec<ChildDefinition>,
}

impl Schema {
    /// Parse schema from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Parse schema from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Lookup index over a schema
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    types: IndexMap<QName, TypeDefinition>,
    prefix_hints: BTreeMap<String, String>,
}

impl SchemaIndex {
    pub fn new(schema: Schema) -> Self {
        let prefix_hints = schema
            .prefixes
            .iter()
            .map(|(prefix, uri)| (uri.clone(), prefix.clone()))
            .collect();
        let types = schema
            .types
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        Self {
            types,
            prefix_hints,
        }
    }

    pub fn get(&self, name: &QName) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn require(&self, name: &QName) -> Result<&TypeDefinition> {
        self.get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    /// Prefix suggested by the schema for a namespace URI
    pub fn prefix_hint(&self, uri: &str) -> Option<&str> {
        self.prefix_hints.get(uri).map(|s| s.as_str())
    }

    /// Type bound to a property, if it is a known complex type
    pub fn property_type(&self, property: &PropertyDefinition) -> Option<&TypeDefinition> {
        property.type_name.as_ref().and_then(|t| self.get(t))
    }

    /// Children reachable below a property
    pub fn property_children(&self, property: &PropertyDefinition) -> &[ChildDefinition] {
        self.property_type(property)
            .map(|t| t.children.as_slice())
            .unwrap_or(&[])
    }

    /// First direct element child of `property` whose type is a feature type other than `exclude`
    pub fn contained_feature(
        &self,
        property: &PropertyDefinition,
        exclude: &QName,
    ) -> Option<(&PropertyDefinition, &TypeDefinition)> {
        find_contained_feature(self, self.property_children(property), exclude)
    }

    /// Walk plain property names from a type (used for source properties)
    pub fn walk<'a>(
        &'a self,
        type_def: &'a TypeDefinition,
        names: &[QName],
    ) -> Result<&'a PropertyDefinition> {
        let mut children = type_def.children.as_slice();
        let mut found = None;
        for (i, name) in names.iter().enumerate() {
            let property = match find_child(children, name) {
                Some(ChildDefinition::Property(p)) => p,
                Some(ChildDefinition::Group(g)) => {
                    children = &g.children;
                    continue;
                }
                None => {
                    return Err(Error::UnresolvedPath {
                        type_name: type_def.name.to_string(),
                        path: join_local(&names[..i]),
                        step: name.to_string(),
                    })
                }
            };
            children = self.property_children(property);
            found = Some(property);
        }
        found.ok_or_else(|| Error::UnresolvedPath {
            type_name: type_def.name.to_string(),
            path: String::new(),
            step: String::from("(empty)"),
        })
    }
}

/// Find a direct child by name; a bare local name matches any namespace
pub fn find_child<'a>(children: &'a [ChildDefinition], name: &QName) -> Option<&'a ChildDefinition> {
    children.iter().find(|c| c.name() == name).or_else(|| {
        if name.is_qualified() {
            return None;
        }
        children
            .iter()
            .find(|c| c.name().local_name() == name.local_name())
    })
}

fn find_contained_feature<'a>(
    index: &'a SchemaIndex,
    children: &'a [ChildDefinition],
    exclude: &QName,
) -> Option<(&'a PropertyDefinition, &'a TypeDefinition)> {
    for child in children {
        match child {
            ChildDefinition::Property(p) if !p.attribute => {
                if let Some(t) = index.property_type(p) {
                    if t.feature_type && &t.name != exclude {
                        return Some((p, t));
                    }
                }
            }
            ChildDefinition::Group(g) => {
                if let Some(found) = find_contained_feature(index, &g.children, exclude) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn join_local(names: &[QName]) -> String {
    names
        .iter()
        .map(|n| n.local_name())
        .collect::<Vec<_>>()
        .join("/")
}
