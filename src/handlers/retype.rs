//! Retype: bind a source type to a target feature type

use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::document::FeatureTypeMapping;
use crate::error::{Error, Result};

pub(super) fn handle_type(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<FeatureTypeMapping> {
    let source = cell.primary_source()?;
    let target = cell.target_entity()?;
    if !source.is_type() || !target.is_type() {
        return Err(Error::InvalidCell {
            cell: cell.id.clone(),
            message: "retype relates whole types".into(),
        });
    }
    ctx.source().require(&source.type_name)?;
    Ok(ctx
        .get_or_create_feature_type_mapping(&target.type_name, &source.type_name)?
        .clone())
}
