//! Join planning (feature chaining)
//!
//! A join cell relates a base source type to one or more joined source
//! types through key equalities. Each condition becomes a link between
//! two target feature types: the container, which holds the nested
//! element, and the nested type, which is emitted as a separate type
//! mapping chained to the container through a shared link field.
//!
//! Where the nested type sits inside the container is not part of the
//! join itself. It is discovered from the other cells of the alignment:
//!
//! 1. a property cell reading the joined type whose target path crosses
//!    from the container into a nested feature type (containment), or
//! 2. a property cell whose last element holds a nested feature type
//!    (typically an `xlink:href` on that element, i.e. a reference), or
//! 3. failing both, the first element path in the container schema that
//!    leads to the target type the joined type is retyped to.
//!
//! All conditions are planned before anything is written to the context,
//! so a failing condition leaves both sides unlinked.

use crate::alignment::{Cell, JoinParameter};
use crate::context::MappingContext;
use crate::error::{Error, Result};
use crate::handlers::FunctionHandler;
use crate::path::{PathResolver, PathSegment, Placement};
use crate::schema::{ChildDefinition, QName, SchemaIndex, TypeDefinition, XLINK_NS};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const MAX_SEARCH_DEPTH: usize = 12;

/// One planned link
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    pub container_type: QName,
    pub container_source: QName,
    pub nested_type: QName,
    pub nested_source: QName,
    /// Path of the nested element within the container
    pub container_segments: Vec<PathSegment>,
    pub base_key: String,
    pub foreign_key: String,
    /// The nested feature is referenced (`xlink:href`) rather than inlined
    pub reference: bool,
}

#[derive(Debug)]
struct Nesting {
    segments: Vec<PathSegment>,
    nested_type: QName,
    reference: bool,
}

/// Plans and installs feature links for join cells
pub struct JoinPlanner;

impl JoinPlanner {
    /// Compute the links for a join cell without touching the context
    pub fn plan(cell: &Cell, ctx: &MappingContext<'_>) -> Result<Vec<JoinPlan>> {
        let join = join_parameter(cell)?;
        let container_root = cell.target_entity()?.type_name.clone();
        let base_type = join.types.first().ok_or_else(|| Error::InvalidParameter {
            function: cell.function.clone(),
            parameter: "join".into(),
            message: "join names no types".into(),
        })?;

        let mut targets: HashMap<QName, QName> = HashMap::new();
        targets.insert(base_type.clone(), container_root);

        let mut plans = Vec::with_capacity(join.conditions.len());
        for condition in &join.conditions {
            check_key(cell, ctx.source(), &condition.base.type_name, &condition.base.names())?;
            check_key(cell, ctx.source(), &condition.join.type_name, &condition.join.names())?;

            let base_source = &condition.base.type_name;
            let nested_source = &condition.join.type_name;
            if !join.types.contains(nested_source) {
                return Err(key_error(
                    cell,
                    format!("{} is not one of the joined types", nested_source),
                ));
            }

            let container_type = targets.get(base_source).cloned().ok_or_else(|| {
                key_error(
                    cell,
                    format!("base type {} is not yet part of the join chain", base_source),
                )
            })?;

            let nesting = discover_nesting(ctx, &container_type, nested_source).ok_or_else(|| {
                key_error(
                    cell,
                    format!(
                        "cannot determine where {} is nested in {}",
                        nested_source, container_type
                    ),
                )
            })?;

            debug!(
                cell = %cell.id,
                container = %container_type,
                nested = %nesting.nested_type,
                reference = nesting.reference,
                "planned join condition"
            );

            targets.insert(nested_source.clone(), nesting.nested_type.clone());
            plans.push(JoinPlan {
                container_type,
                container_source: base_source.clone(),
                nested_type: nesting.nested_type,
                nested_source: nested_source.clone(),
                container_segments: nesting.segments,
                base_key: condition.base.property_expression(),
                foreign_key: condition.join.property_expression(),
                reference: nesting.reference,
            });
        }

        Ok(plans)
    }

    /// Install planned links; repeated application yields the same state
    pub fn apply(plans: &[JoinPlan], ctx: &mut MappingContext<'_>) -> Result<()> {
        for plan in plans {
            let link = ctx.register_link(&plan.container_type, &plan.nested_type)?;
            ctx.get_or_create_feature_type_mapping(&plan.container_type, &plan.container_source)?;
            ctx.get_or_create_feature_type_mapping(&plan.nested_type, &plan.nested_source)?;

            let owner_key = ctx.render_path(&plan.container_segments);
            let href = ctx.render_qname(&QName::new(XLINK_NS, "href"));

            let container = ctx.upsert_attribute(&plan.container_type, &owner_key)?;
            container.source_expression = Some(plan.base_key.clone());
            container.link_element = Some(link.link_element.clone());
            container.link_field = Some(link.link_field.clone());
            container.is_multiple = true;
            if plan.reference && container.client_property(&href).is_none() {
                container.set_client_property(&href, &plan.foreign_key);
            }

            let nested = ctx.upsert_attribute(&plan.nested_type, &link.link_field)?;
            nested.source_expression = Some(plan.foreign_key.clone());
        }
        Ok(())
    }

    /// Plan and apply in one step
    pub fn link(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Vec<JoinPlan>> {
        let plans = Self::plan(cell, ctx)?;
        Self::apply(&plans, ctx)?;
        Ok(plans)
    }
}

fn join_parameter(cell: &Cell) -> Result<&JoinParameter> {
    let value = cell.parameter("join").ok_or_else(|| Error::MissingParameter {
        function: cell.function.clone(),
        parameter: "join".into(),
    })?;
    value.as_join().ok_or_else(|| Error::InvalidParameter {
        function: cell.function.clone(),
        parameter: "join".into(),
        message: "expected a join specification".into(),
    })
}

fn key_error(cell: &Cell, message: String) -> Error {
    Error::UnresolvedJoinKey {
        cell: cell.id.clone(),
        message,
    }
}

fn check_key(cell: &Cell, source: &SchemaIndex, type_name: &QName, names: &[QName]) -> Result<()> {
    let type_def = source
        .require(type_name)
        .map_err(|e| key_error(cell, e.to_string()))?;
    source
        .walk(type_def, names)
        .map(|_| ())
        .map_err(|e| key_error(cell, e.to_string()))
}

fn discover_nesting(
    ctx: &MappingContext<'_>,
    container_type: &QName,
    nested_source: &QName,
) -> Option<Nesting> {
    let alignment = ctx.alignment()?;
    let resolver = PathResolver::new(ctx.target());

    for cell in alignment.cells.iter().filter(|c| !c.is_type_cell()) {
        let Ok(target) = cell.target_entity() else {
            continue;
        };
        if &target.type_name != container_type {
            continue;
        }
        let reads_nested =
            cell.source.is_empty() || cell.source.iter().any(|s| &s.type_name == nested_source);
        if !reads_nested {
            continue;
        }
        let Ok(resolved) = resolver.resolve(container_type, &target.path) else {
            continue;
        };

        if let Some(crossing) = resolved.crossings.first() {
            return Some(Nesting {
                segments: crossing.container_segments.clone(),
                nested_type: crossing.nested_type.clone(),
                reference: false,
            });
        }

        if let Some(last) = &resolved.last_element {
            if let Some((_, nested)) = ctx.target().contained_feature(last, container_type) {
                let reference = matches!(
                    &resolved.placement,
                    Placement::ClientProperty(name) if name.namespace() == XLINK_NS
                );
                return Some(Nesting {
                    segments: resolved.segments.clone(),
                    nested_type: nested.name.clone(),
                    reference,
                });
            }
        }
    }

    // Fall back to the schema, using the target type the joined type is retyped to.
    // Join cells list the joined type among their sources too, so only retypes count.
    let retyped = alignment
        .cells
        .iter()
        .filter(|c| FunctionHandler::for_function(&c.function) == Some(FunctionHandler::Retype))
        .filter(|c| c.source.iter().any(|s| &s.type_name == nested_source))
        .filter_map(|c| c.target.first().map(|t| t.type_name.clone()))
        .find(|t| t != container_type)?;
    let container = ctx.target().get(container_type)?;
    let segments = find_feature_path(ctx.target(), container, &retyped)?;
    Some(Nesting {
        segments,
        nested_type: retyped,
        reference: false,
    })
}

/// Segments to the property holding an element of `wanted`, searched depth first
fn find_feature_path(
    index: &SchemaIndex,
    from: &TypeDefinition,
    wanted: &QName,
) -> Option<Vec<PathSegment>> {
    let mut visited = HashSet::new();
    visited.insert(from.name.clone());
    let mut segments = Vec::new();
    search(index, &from.children, wanted, &mut segments, &mut visited)
}

fn search(
    index: &SchemaIndex,
    children: &[ChildDefinition],
    wanted: &QName,
    segments: &mut Vec<PathSegment>,
    visited: &mut HashSet<QName>,
) -> Option<Vec<PathSegment>> {
    if segments.len() > MAX_SEARCH_DEPTH {
        return None;
    }
    for child in children {
        match child {
            ChildDefinition::Group(g) => {
                if let Some(found) = search(index, &g.children, wanted, segments, visited) {
                    return Some(found);
                }
            }
            ChildDefinition::Property(p) if !p.attribute => {
                let Some(t) = index.property_type(p) else {
                    continue;
                };
                if &t.name == wanted {
                    return Some(segments.clone());
                }
                if t.feature_type || !visited.insert(t.name.clone()) {
                    continue;
                }
                segments.push(PathSegment::new(p.name.clone(), None));
                if let Some(found) = search(index, &t.children, wanted, segments, visited) {
                    return Some(found);
                }
                segments.pop();
            }
            ChildDefinition::Property(_) => {}
        }
    }
    None
}
