//! Shared placement of property expressions

use crate::alignment::{Cell, EntityRef};
use crate::condition::ConditionNode;
use crate::context::MappingContext;
use crate::document::AttributeMapping;
use crate::error::{Error, Result};
use crate::expression::{quote, Expr};
use crate::path::{PathResolver, Placement};
use tracing::debug;

/// Validate a source property and return its expression
pub(super) fn source_property(ctx: &MappingContext<'_>, entity: &EntityRef) -> Result<Expr> {
    let type_def = ctx.source().require(&entity.type_name)?;
    ctx.source().walk(type_def, &entity.names())?;
    Ok(Expr::property(&entity.property_expression()))
}

/// The single source property of a cell
pub(super) fn primary_source_property(ctx: &MappingContext<'_>, cell: &Cell) -> Result<Expr> {
    source_property(ctx, cell.primary_source()?)
}

/// Source entities bound to `role`; all sources when none carries it
pub(super) fn role_sources<'c>(cell: &'c Cell, role: &'c str) -> Vec<&'c EntityRef> {
    let with_role: Vec<&EntityRef> = cell.sources_with_role(role).collect();
    if with_role.is_empty() {
        cell.source.iter().collect()
    } else {
        with_role
    }
}

/// Resolve the cell's target path and store `expression` at the resulting place
pub(super) fn apply(
    type_cell: &Cell,
    cell: &Cell,
    ctx: &mut MappingContext<'_>,
    expression: Expr,
) -> Result<AttributeMapping> {
    let target = cell.target_entity()?;
    let type_target = type_cell.target_entity()?;
    if target.type_name != type_target.type_name {
        return Err(Error::InvalidCell {
            cell: cell.id.clone(),
            message: format!(
                "targets {} but type cell {} establishes {}",
                target.type_name, type_cell.id, type_target.type_name
            ),
        });
    }
    let root_source = type_cell
        .source_types()
        .first()
        .map(|t| (*t).clone())
        .ok_or_else(|| Error::InvalidCell {
            cell: type_cell.id.clone(),
            message: "type cell has no source type".into(),
        })?;
    ctx.get_or_create_feature_type_mapping(&target.type_name, &root_source)?;

    let resolved = PathResolver::new(ctx.target()).resolve(&target.type_name, &target.path)?;
    for crossing in &resolved.crossings {
        if ctx.link(&crossing.container_type, &crossing.nested_type).is_none() {
            return Err(Error::UnlinkedFeatureType {
                container: crossing.container_type.to_string(),
                nested: crossing.nested_type.to_string(),
            });
        }
    }
    if resolved.ends_at_feature() {
        return Err(Error::InvalidCell {
            cell: cell.id.clone(),
            message: "path ends at a nested feature element; map it through a join".into(),
        });
    }

    let expression = match guard(cell, &resolved.guards) {
        Some(condition) => {
            condition.validate()?;
            expression.guarded(condition.to_expr())
        }
        None => expression,
    };
    let rendered = expression.to_string();

    let owner_key = if resolved.segments.is_empty() {
        ctx.target_element_name(&resolved.owner_type)?
    } else {
        ctx.render_path(&resolved.segments)
    };
    let node = resolved.node.as_ref().map(|n| ctx.render_qname(n));
    let client_name = match &resolved.placement {
        Placement::ClientProperty(name) => Some(ctx.render_qname(name)),
        _ => None,
    };

    let srs_name = if resolved.geometry && resolved.placement == Placement::Element {
        match &ctx.config().target_crs {
            Some(crs) => Some(quote(crs)),
            None => {
                ctx.warn(format!(
                    "{}: no target CRS configured for geometry {}, using native CRS",
                    cell.id, owner_key
                ));
                None
            }
        }
    } else {
        None
    };

    debug!(
        cell = %cell.id,
        owner = %owner_key,
        placement = ?resolved.placement,
        expression = %rendered,
        "placed property expression"
    );

    let attribute = ctx.upsert_attribute(&resolved.owner_type, &owner_key)?;
    if resolved.is_multiple {
        attribute.is_multiple = true;
    }
    match &resolved.placement {
        Placement::Element => {
            attribute.source_expression = Some(rendered);
            attribute.target_attribute_node = node;
            if let Some(srs) = srs_name {
                attribute.set_client_property("srsName", &srs);
            }
        }
        Placement::Id => attribute.id_expression = Some(rendered),
        Placement::ClientProperty(_) => {
            let name = client_name.unwrap_or_default();
            attribute.set_client_property(&name, &rendered);
        }
    }
    Ok(attribute.clone())
}

/// Step guards plus source-entity conditions, AND-ed
fn guard(cell: &Cell, step_guards: &[ConditionNode]) -> Option<ConditionNode> {
    let mut all: Vec<ConditionNode> = step_guards.to_vec();
    for source in &cell.source {
        all.extend(source.path.iter().filter_map(|s| s.condition.clone()));
        all.extend(source.condition.clone());
    }
    match all.len() {
        0 => None,
        1 => all.pop(),
        _ => Some(ConditionNode::and(all)),
    }
}
