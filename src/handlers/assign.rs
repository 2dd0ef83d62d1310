//! Assign: a constant, optionally bound to an anchor property
//!
//! The bound form yields no value wherever the anchor is null.

use super::property;
use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::error::Result;
use crate::expression::Expr;

pub(super) const PARAMETER_VALUE: &str = "value";
pub(super) const ENTITY_ANCHOR: &str = "anchor";
pub(super) const ID_BOUND: &str = "assign_bound";

pub(super) fn expression(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Expr> {
    let value = Expr::string(&cell.require_text_parameter(PARAMETER_VALUE)?);

    let anchor = cell
        .sources_with_role(ENTITY_ANCHOR)
        .next()
        .or_else(|| {
            if cell.function == ID_BOUND {
                cell.source.first()
            } else {
                None
            }
        });

    match anchor {
        Some(anchor) => {
            let anchor = property::source_property(ctx, anchor)?;
            Ok(Expr::if_then_else(Expr::is_null(anchor), Expr::Nil, value))
        }
        None => Ok(value),
    }
}
