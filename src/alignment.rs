//! Alignment model
//!
//! An alignment is a set of cells. Each cell names a transformation function,
//! the source entities it reads, the target entities it writes and a
//! multimap of parameters. A target entity with an empty path is a whole
//! type (type transformation); otherwise it is a path into the type's schema
//! tree (property transformation).
//!
//! ## Example
//!
//! ```yaml
//! cells:
//!   - id: retype-unit
//!     function: retype
//!     source:
//!       - type: landcover_norm
//!     target:
//!       - type: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}LandCoverUnitType"
//!   - id: classify
//!     function: classification
//!     source:
//!       - type: landcover_norm
//!         path: [{ name: unit_id }]
//!     target:
//!       - type: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}LandCoverUnitType"
//!         path:
//!           - name: "{http://www.opengis.net/gml/3.2}metaDataProperty"
//!           - name: "{http://www.w3.org/1999/xlink}href"
//!     parameters:
//!       lookupTable:
//!         lookup: { 1000: t1, 2000: t2 }
//!       notClassifiedAction: source
//! ```

use crate::condition::{ConditionNode, LiteralValue};
use crate::error::{Error, Result};
use crate::handlers::FunctionHandler;
use crate::schema::QName;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

/// A complete alignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Alignment {
    /// Optional alignment identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Cells in caller order
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// One mapping rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Cell {
    pub id: String,

    /// Transformation function identifier (e.g. `retype`, `rename`)
    pub function: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<EntityRef>,

    #[serde(default)]
    pub target: Vec<EntityRef>,

    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

/// Reference to a type or to a property path within a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityRef {
    /// Role name within the cell (e.g. `var`, `anchor`, `types`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Owning type
    #[serde(rename = "type")]
    pub type_name: QName,

    /// Steps from the type root; empty for a type entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathStep>,

    /// Restriction on the instances this entity applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionNode>,
}

/// One child step of a property path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PathStep {
    pub name: QName,

    /// Zero-based repetition index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// Guard selecting among repeated or choice elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionNode>,
}

impl PathStep {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            index: None,
            condition: None,
        }
    }

    pub fn indexed(name: QName, index: usize) -> Self {
        Self {
            name,
            index: Some(index),
            condition: None,
        }
    }
}

impl From<QName> for PathStep {
    fn from(name: QName) -> Self {
        PathStep::new(name)
    }
}

impl EntityRef {
    /// Whole-type entity
    pub fn type_entity(type_name: QName) -> Self {
        Self {
            role: None,
            type_name,
            path: vec![],
            condition: None,
        }
    }

    /// Property entity from plain steps
    pub fn property(type_name: QName, path: Vec<PathStep>) -> Self {
        Self {
            role: None,
            type_name,
            path,
            condition: None,
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn is_type(&self) -> bool {
        self.path.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    /// Plain property names along the path
    pub fn names(&self) -> Vec<QName> {
        self.path.iter().map(|s| s.name.clone()).collect()
    }

    /// Source-side expression: local names joined with `/`
    pub fn property_expression(&self) -> String {
        self.path
            .iter()
            .map(|s| s.name.local_name())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Last step name, if any
    pub fn leaf_name(&self) -> Option<&str> {
        self.path.last().map(|s| s.name.local_name())
    }
}

impl Cell {
    pub fn new(id: &str, function: &str) -> Self {
        Self {
            id: id.to_string(),
            function: function.to_string(),
            source: vec![],
            target: vec![],
            parameters: Parameters::default(),
        }
    }

    pub fn with_source(mut self, source: EntityRef) -> Self {
        self.source.push(source);
        self
    }

    pub fn with_target(mut self, target: EntityRef) -> Self {
        self.target.push(target);
        self
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.parameters.insert(name, value.into());
        self
    }

    /// True when every target is a whole type
    pub fn is_type_cell(&self) -> bool {
        !self.target.is_empty() && self.target.iter().all(|t| t.is_type())
    }

    /// The single target entity of the cell
    pub fn target_entity(&self) -> Result<&EntityRef> {
        self.target.first().ok_or_else(|| Error::InvalidCell {
            cell: self.id.clone(),
            message: "cell has no target".into(),
        })
    }

    /// Source entities carrying `role`
    pub fn sources_with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a EntityRef> {
        self.source.iter().filter(move |s| s.has_role(role))
    }

    /// First source entity, regardless of role
    pub fn primary_source(&self) -> Result<&EntityRef> {
        self.source.first().ok_or_else(|| Error::InvalidCell {
            cell: self.id.clone(),
            message: "cell has no source".into(),
        })
    }

    /// Distinct source types in order of appearance
    pub fn source_types(&self) -> Vec<&QName> {
        let mut types: Vec<&QName> = Vec::new();
        for source in &self.source {
            if !types.contains(&&source.type_name) {
                types.push(&source.type_name);
            }
        }
        types
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.first(name)
    }

    /// Literal parameter rendered as text
    pub fn text_parameter(&self, name: &str) -> Option<String> {
        self.parameter(name)
            .and_then(|p| p.as_literal())
            .map(|l| l.to_string())
    }

    pub fn require_text_parameter(&self, name: &str) -> Result<String> {
        self.text_parameter(name)
            .ok_or_else(|| Error::MissingParameter {
                function: self.function.clone(),
                parameter: name.to_string(),
            })
    }
}

/// Ordered multimap of parameter name to values
///
/// Each name serializes as a single value or, when repeated, as a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(IndexMap<String, Vec<ParameterValue>>);

impl Parameters {
    pub fn insert(&mut self, name: &str, value: ParameterValue) {
        self.0.entry(name.to_string()).or_default().push(value);
    }

    pub fn first(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name).and_then(|values| values.first())
    }

    pub fn get_all(&self, name: &str) -> &[ParameterValue] {
        self.0.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ParameterValue>),
    One(ParameterValue),
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in &self.0 {
            match values.as_slice() {
                [single] => map.serialize_entry(name, single)?,
                many => map.serialize_entry(name, many)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = IndexMap::<String, OneOrMany>::deserialize(deserializer)?;
        Ok(Parameters(
            raw.into_iter()
                .map(|(name, value)| match value {
                    OneOrMany::Many(values) => (name, values),
                    OneOrMany::One(value) => (name, vec![value]),
                })
                .collect(),
        ))
    }
}

impl JsonSchema for Parameters {
    fn schema_name() -> Cow<'static, str> {
        "Parameters".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        <BTreeMap<String, Vec<ParameterValue>>>::json_schema(generator)
    }
}

/// A parameter value: a literal or a structured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParameterValue {
    Literal(LiteralValue),
    Complex(ComplexValue),
}

impl ParameterValue {
    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match self {
            ParameterValue::Literal(lit) => Some(lit),
            ParameterValue::Complex(_) => None,
        }
    }

    pub fn as_lookup(&self) -> Option<&LookupTable> {
        match self {
            ParameterValue::Complex(ComplexValue::Lookup(table)) => Some(table),
            _ => None,
        }
    }

    pub fn as_join(&self) -> Option<&JoinParameter> {
        match self {
            ParameterValue::Complex(ComplexValue::Join(join)) => Some(join),
            _ => None,
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::Literal(LiteralValue::from(s))
    }
}

impl From<LiteralValue> for ParameterValue {
    fn from(lit: LiteralValue) -> Self {
        ParameterValue::Literal(lit)
    }
}

impl From<LookupTable> for ParameterValue {
    fn from(table: LookupTable) -> Self {
        ParameterValue::Complex(ComplexValue::Lookup(table))
    }
}

impl From<JoinParameter> for ParameterValue {
    fn from(join: JoinParameter) -> Self {
        ParameterValue::Complex(ComplexValue::Join(join))
    }
}

/// Structured parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComplexValue {
    Lookup(LookupTable),
    Join(JoinParameter),
}

/// Source literal -> target literal, in insertion order
///
/// Keys keep their literal kind: numbers are emitted bare, strings quoted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTable {
    entries: Vec<(LiteralValue, String)>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: impl Into<LiteralValue>, value: &str) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key, value.to_string())),
        }
    }

    pub fn entries(&self) -> &[(LiteralValue, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Keys given as text are read with [`LiteralValue::from_text`]
impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for LookupTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = LookupTable::new();
        for (k, v) in iter {
            table.insert(LiteralValue::from_text(k.as_ref()), v.as_ref());
        }
        table
    }
}

impl Serialize for LookupTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            match k {
                LiteralValue::Integer(i) => map.serialize_entry(i, v)?,
                other => map.serialize_entry(&other.to_string(), v)?,
            }
        }
        map.end()
    }
}

struct LookupVisitor;

impl<'de> Visitor<'de> for LookupVisitor {
    type Value = LookupTable;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "a map of source literals to target literals")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<LookupTable, A::Error> {
        let mut table = LookupTable::new();
        while let Some((key, value)) = access.next_entry::<LiteralValue, LiteralValue>()? {
            // JSON object keys are always strings
            let key = match key {
                LiteralValue::String(text) => LiteralValue::from_text(&text),
                other => other,
            };
            table.insert(key, &value.to_string());
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for LookupTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(LookupVisitor)
    }
}

impl JsonSchema for LookupTable {
    fn schema_name() -> Cow<'static, str> {
        "LookupTable".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        <BTreeMap<String, String>>::json_schema(generator)
    }
}

/// Join specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JoinParameter {
    /// Participating source types, base type first
    pub types: Vec<QName>,

    /// Key equalities, planned in order
    pub conditions: Vec<JoinCondition>,
}

/// `base` key equals `join` foreign key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JoinCondition {
    pub base: EntityRef,
    pub join: EntityRef,
}

/// Severity level for alignment validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found before compiling
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
}

impl ValidationIssue {
    fn error(code: &str, message: String, cell: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            message,
            cell: Some(cell.to_string()),
        }
    }

    fn warning(code: &str, message: String, cell: &str) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            message,
            cell: Some(cell.to_string()),
        }
    }
}

impl Alignment {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { id: None, cells }
    }

    /// Parse alignment from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Parse alignment from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_norway::to_string(self)?)
    }

    pub fn cell(&self, id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == id)
    }

    /// Structural checks run before compilation
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for cell in &self.cells {
            if !seen.insert(cell.id.as_str()) {
                issues.push(ValidationIssue::error(
                    "E001",
                    format!("Duplicate cell id '{}'", cell.id),
                    &cell.id,
                ));
            }

            if cell.target.is_empty() {
                issues.push(ValidationIssue::error(
                    "E002",
                    "Cell has no target".to_string(),
                    &cell.id,
                ));
            }

            if FunctionHandler::for_function(&cell.function).is_none() {
                issues.push(ValidationIssue::error(
                    "E003",
                    format!("Unknown transformation function '{}'", cell.function),
                    &cell.id,
                ));
            }

            for condition in cell_conditions(cell) {
                if let Err(e) = condition.validate() {
                    issues.push(ValidationIssue::error("E004", e.to_string(), &cell.id));
                }
            }

            if cell.target.len() > 1 {
                issues.push(ValidationIssue::warning(
                    "W001",
                    format!(
                        "Cell has {} targets; only the first is compiled",
                        cell.target.len()
                    ),
                    &cell.id,
                ));
            }
        }

        issues
    }
}

/// Every condition tree attached to a cell's entities and path steps
fn cell_conditions(cell: &Cell) -> Vec<&ConditionNode> {
    let mut found = Vec::new();
    for entity in cell.source.iter().chain(cell.target.iter()) {
        found.extend(entity.condition.iter());
        found.extend(entity.path.iter().filter_map(|s| s.condition.as_ref()));
    }
    found
}
