//! Join: feature chaining between joined source types

use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::document::{AttributeMapping, FeatureTypeMapping};
use crate::error::{Error, Result};
use crate::join::JoinPlanner;

pub(super) fn handle_type(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<FeatureTypeMapping> {
    let plans = JoinPlanner::link(cell, ctx)?;
    let target = cell.target_entity()?;
    let base = match plans.first() {
        Some(plan) => plan.container_source.clone(),
        None => cell.primary_source()?.type_name.clone(),
    };
    Ok(ctx
        .get_or_create_feature_type_mapping(&target.type_name, &base)?
        .clone())
}

/// The container-side link attribute of the first planned link
pub(super) fn handle_property(
    cell: &Cell,
    ctx: &mut MappingContext<'_>,
) -> Result<AttributeMapping> {
    let plans = JoinPlanner::link(cell, ctx)?;
    let plan = plans.first().ok_or_else(|| Error::InvalidParameter {
        function: cell.function.clone(),
        parameter: "join".into(),
        message: "join has no conditions".into(),
    })?;
    let owner_key = ctx.render_path(&plan.container_segments);
    ctx.attribute(&plan.container_type, &owner_key)
        .cloned()
        .ok_or_else(|| Error::Other(format!("link attribute {} missing", owner_key)))
}
