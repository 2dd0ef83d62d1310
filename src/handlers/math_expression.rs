//! Mathematical expression: emitted verbatim

use super::property;
use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::error::{Error, Result};
use crate::expression::Expr;

pub(super) const PARAMETER_EXPRESSION: &str = "expression";
pub(super) const ENTITY_VARIABLE: &str = "var";

pub(super) fn expression(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Expr> {
    let text = cell.require_text_parameter(PARAMETER_EXPRESSION)?;
    if text.trim().is_empty() {
        return Err(Error::InvalidParameter {
            function: cell.function.clone(),
            parameter: PARAMETER_EXPRESSION.into(),
            message: "expression is empty".into(),
        });
    }
    for variable in property::role_sources(cell, ENTITY_VARIABLE) {
        property::source_property(ctx, variable)?;
    }
    Ok(Expr::raw(&text))
}
