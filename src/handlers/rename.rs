//! Rename: copy a source property as-is

use super::property;
use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::error::Result;
use crate::expression::Expr;

pub(super) fn expression(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Expr> {
    property::primary_source_property(ctx, cell)
}
