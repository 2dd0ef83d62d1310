//! Formatted string: fill `{name}` placeholders from source variables

use super::property;
use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::error::Result;
use crate::expression::{Expr, FormatPattern};
use std::collections::HashMap;

pub(super) const PARAMETER_PATTERN: &str = "pattern";
pub(super) const ENTITY_VARIABLE: &str = "var";

pub(super) fn expression(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Expr> {
    let pattern = FormatPattern::parse(&cell.require_text_parameter(PARAMETER_PATTERN)?);

    // A variable is addressable by its full path or its leaf name
    let mut bindings: HashMap<String, Expr> = HashMap::new();
    for variable in property::role_sources(cell, ENTITY_VARIABLE) {
        let expr = property::source_property(ctx, variable)?;
        if let Some(leaf) = variable.leaf_name() {
            bindings.entry(leaf.to_string()).or_insert_with(|| expr.clone());
        }
        bindings.insert(variable.property_expression(), expr);
    }

    pattern.compose(&cell.function, |name| bindings.get(name).cloned())
}
