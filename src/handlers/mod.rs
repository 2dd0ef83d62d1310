//! Transformation function handlers
//!
//! Each function identifier selects one handler. A handler implements one
//! or both capabilities:
//!
//! | Handler | Type | Property |
//! |---------|------|----------|
//! | retype | yes | |
//! | join | yes | yes |
//! | rename, classification, formatted_string, date_extraction, math_expression, assign | | yes |
//!
//! Handlers are stateless. Everything they produce goes into the
//! [`MappingContext`] passed to them; the returned mapping is a copy of the
//! entry as it stands after the call.

mod assign;
mod classification;
mod date_extraction;
mod formatted_string;
mod join;
mod math_expression;
mod property;
mod rename;
mod retype;

pub use classification::NotClassifiedAction;

use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::document::{AttributeMapping, FeatureTypeMapping};
use crate::error::{Error, Result};

/// What a handler can do with a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Produces or locates a feature type mapping
    TypeTransformation,
    /// Produces one attribute mapping
    PropertyTransformation,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::TypeTransformation => write!(f, "type"),
            Capability::PropertyTransformation => write!(f, "property"),
        }
    }
}

/// Handler registry, one variant per supported function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionHandler {
    Retype,
    Rename,
    Join,
    Classification,
    FormattedString,
    DateExtraction,
    MathematicalExpression,
    Assign,
}

const TYPE_ONLY: &[Capability] = &[Capability::TypeTransformation];
const PROPERTY_ONLY: &[Capability] = &[Capability::PropertyTransformation];
const BOTH: &[Capability] = &[
    Capability::TypeTransformation,
    Capability::PropertyTransformation,
];

impl FunctionHandler {
    pub const ALL: [FunctionHandler; 8] = [
        FunctionHandler::Retype,
        FunctionHandler::Rename,
        FunctionHandler::Join,
        FunctionHandler::Classification,
        FunctionHandler::FormattedString,
        FunctionHandler::DateExtraction,
        FunctionHandler::MathematicalExpression,
        FunctionHandler::Assign,
    ];

    /// Handler for a function identifier
    pub fn for_function(id: &str) -> Option<Self> {
        match id {
            "retype" => Some(FunctionHandler::Retype),
            "rename" => Some(FunctionHandler::Rename),
            "join" => Some(FunctionHandler::Join),
            "classification" => Some(FunctionHandler::Classification),
            "formatted_string" => Some(FunctionHandler::FormattedString),
            "date_extraction" => Some(FunctionHandler::DateExtraction),
            "math_expression" => Some(FunctionHandler::MathematicalExpression),
            "assign" | "assign_bound" => Some(FunctionHandler::Assign),
            _ => None,
        }
    }

    /// Like [`Self::for_function`], failing with `UnknownFunction`
    pub fn require(id: &str) -> Result<Self> {
        Self::for_function(id).ok_or_else(|| Error::UnknownFunction(id.to_string()))
    }

    /// Primary function identifier
    pub fn id(&self) -> &'static str {
        match self {
            FunctionHandler::Retype => "retype",
            FunctionHandler::Rename => "rename",
            FunctionHandler::Join => "join",
            FunctionHandler::Classification => "classification",
            FunctionHandler::FormattedString => "formatted_string",
            FunctionHandler::DateExtraction => "date_extraction",
            FunctionHandler::MathematicalExpression => "math_expression",
            FunctionHandler::Assign => "assign",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            FunctionHandler::Retype => TYPE_ONLY,
            FunctionHandler::Join => BOTH,
            _ => PROPERTY_ONLY,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    fn unsupported(&self, capability: Capability) -> Error {
        Error::UnsupportedCapability {
            function: self.id().to_string(),
            capability: capability.to_string(),
        }
    }

    /// Establish the feature type mapping of a type cell
    pub fn handle_type_transformation(
        &self,
        cell: &Cell,
        ctx: &mut MappingContext<'_>,
    ) -> Result<FeatureTypeMapping> {
        match self {
            FunctionHandler::Retype => retype::handle_type(cell, ctx),
            FunctionHandler::Join => join::handle_type(cell, ctx),
            _ => Err(self.unsupported(Capability::TypeTransformation)),
        }
    }

    /// Compile a property cell into the mapping established by `type_cell`
    pub fn handle_property_transformation(
        &self,
        type_cell: &Cell,
        cell: &Cell,
        ctx: &mut MappingContext<'_>,
    ) -> Result<AttributeMapping> {
        let expression = match self {
            FunctionHandler::Retype => {
                return Err(self.unsupported(Capability::PropertyTransformation))
            }
            FunctionHandler::Join => return join::handle_property(cell, ctx),
            FunctionHandler::Rename => rename::expression(cell, ctx)?,
            FunctionHandler::Classification => classification::expression(cell, ctx)?,
            FunctionHandler::FormattedString => formatted_string::expression(cell, ctx)?,
            FunctionHandler::DateExtraction => date_extraction::expression(cell, ctx)?,
            FunctionHandler::MathematicalExpression => math_expression::expression(cell, ctx)?,
            FunctionHandler::Assign => assign::expression(cell, ctx)?,
        };
        property::apply(type_cell, cell, ctx, expression)
    }
}
