//! Date extraction: parse a source property with a date format

use super::property;
use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::error::Result;
use crate::expression::Expr;

pub(super) const PARAMETER_DATE_FORMAT: &str = "dateFormat";

pub(super) fn expression(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Expr> {
    let format = cell.require_text_parameter(PARAMETER_DATE_FORMAT)?;
    let source = property::primary_source_property(ctx, cell)?;
    Ok(Expr::date_parse(source, &format))
}
