//! Compiler configuration
//!
//! Loaded from a YAML file passed with `--config`. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! ```yaml
//! namespaces:
//!   http://inspire.ec.europa.eu/schemas/lcv/3.0: lcv
//! link_field_prefix: FEATURE_LINK
//! target_crs: "EPSG:3035"
//! fail_fast: false
//! format: xml
//! ```

use crate::error::{Error, Result};
use crate::schema::{GML_31_NS, GML_NS, XLINK_NS};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Output format of the mapping document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xml,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xml" => Ok(OutputFormat::Xml),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(Error::Config(format!(
                "Unknown output format '{}'. Use xml, json or yaml",
                other
            ))),
        }
    }
}

/// Compiler settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompilerConfig {
    /// Preferred prefixes (namespace URI -> prefix)
    #[serde(default = "default_namespaces")]
    pub namespaces: BTreeMap<String, String>,

    /// Link fields are named `<prefix>[n]`
    #[serde(default = "default_link_field_prefix")]
    pub link_field_prefix: String,

    /// CRS for geometry mappings; native CRS is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_crs: Option<String>,

    /// Stop at the first failing cell
    #[serde(default)]
    pub fail_fast: bool,

    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_namespaces() -> BTreeMap<String, String> {
    [
        (GML_NS, "gml"),
        (GML_31_NS, "gml"),
        (XLINK_NS, "xlink"),
        ("http://www.isotc211.org/2005/gmd", "gmd"),
        ("http://www.isotc211.org/2005/gco", "gco"),
        ("http://inspire.ec.europa.eu/schemas/base/3.3", "base"),
        ("http://inspire.ec.europa.eu/schemas/lcv/3.0", "lcv"),
    ]
    .into_iter()
    .map(|(uri, prefix)| (uri.to_string(), prefix.to_string()))
    .collect()
}

fn default_link_field_prefix() -> String {
    "FEATURE_LINK".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            link_field_prefix: default_link_field_prefix(),
            target_crs: None,
            fail_fast: false,
            format: OutputFormat::default(),
        }
    }
}

impl CompilerConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: CompilerConfig = serde_norway::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_yaml(&content)
    }

    /// Preset prefix for a namespace URI
    pub fn preferred_prefix(&self, uri: &str) -> Option<&str> {
        self.namespaces.get(uri).map(|s| s.as_str())
    }

    /// Link field name for the n-th join (1-based)
    pub fn link_field(&self, n: usize) -> String {
        format!("{}[{}]", self.link_field_prefix, n)
    }

    fn check(&self) -> Result<()> {
        if self.link_field_prefix.trim().is_empty() {
            return Err(Error::Config("link_field_prefix cannot be empty".into()));
        }
        if let Some((uri, _)) = self.namespaces.iter().find(|(_, p)| !is_ncname(p)) {
            return Err(Error::Config(format!(
                "Invalid prefix configured for {}",
                uri
            )));
        }
        Ok(())
    }
}

/// XML NCName check for prefixes
pub(crate) fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
