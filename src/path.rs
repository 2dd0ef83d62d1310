//! Target path resolution
//!
//! Walks a list of alignment path steps through the target schema tree and
//! classifies the result:
//!
//! - element steps become rendered segments; group steps (sequence or
//!   choice) are transparent and may be named explicitly or skipped
//! - an element chosen from a geometry choice renders as the choice's
//!   substitution head and records its concrete type as the node; inside a
//!   GML geometry property the head is folded into the property itself
//! - an element whose type is another feature type is a crossing: the rest
//!   of the path is resolved relative to that nested type
//! - an XML attribute must be the last step and becomes a client property,
//!   except `gml:id`, which becomes an id expression on the feature root or
//!   on a substituted geometry

use crate::alignment::PathStep;
use crate::condition::ConditionNode;
use crate::error::{Error, Result};
use crate::schema::{
    find_child, is_gml_id, is_gml_namespace, ChildDefinition, PropertyDefinition, QName,
    SchemaIndex, TypeDefinition,
};

/// One rendered element step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: QName,
    /// Zero-based repetition index
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn new(name: QName, index: Option<usize>) -> Self {
        Self { name, index }
    }
}

/// Where the compiled expression lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// `sourceExpression` of the element mapping
    Element,
    /// `idExpression` of the owning element mapping
    Id,
    /// Client property of the owning element mapping
    ClientProperty(QName),
}

/// A path leaving one feature type for another
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub container_type: QName,
    /// Segments from the container root to the containing property
    pub container_segments: Vec<PathSegment>,
    pub nested_type: QName,
    pub nested_element: QName,
}

/// Result of resolving a target path
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// Feature type owning the mapping (the root, or the last nested type)
    pub owner_type: QName,
    /// Element segments relative to `owner_type`
    pub segments: Vec<PathSegment>,
    /// Concrete substitution type, when the path goes through a geometry choice
    pub node: Option<QName>,
    pub placement: Placement,
    pub is_multiple: bool,
    /// Step conditions, in path order
    pub guards: Vec<ConditionNode>,
    /// The last element is a geometry
    pub geometry: bool,
    pub crossings: Vec<Crossing>,
    /// Schema definition of the last element step
    pub last_element: Option<PropertyDefinition>,
}

impl ResolvedPath {
    pub fn crosses_types(&self) -> bool {
        !self.crossings.is_empty()
    }

    /// True when the path stops at a nested feature element itself
    pub fn ends_at_feature(&self) -> bool {
        self.crosses_types() && self.segments.is_empty() && self.placement == Placement::Element
    }
}

/// Resolves target paths against a schema index
pub struct PathResolver<'a> {
    index: &'a SchemaIndex,
}

struct Located<'a> {
    child: &'a ChildDefinition,
    /// Substitution head of a group traversed implicitly
    head: Option<&'a QName>,
    /// An implicitly traversed group repeats
    repeatable: bool,
}

fn locate<'a>(children: &'a [ChildDefinition], name: &QName) -> Option<Located<'a>> {
    if let Some(child) = find_child(children, name) {
        return Some(Located {
            child,
            head: None,
            repeatable: false,
        });
    }
    children.iter().find_map(|c| match c {
        ChildDefinition::Group(g) => locate(&g.children, name).map(|found| Located {
            child: found.child,
            head: found.head.or(g.substitution_head.as_ref()),
            repeatable: found.repeatable || g.repeatable,
        }),
        ChildDefinition::Property(_) => None,
    })
}

impl<'a> PathResolver<'a> {
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self { index }
    }

    pub fn resolve(&self, root: &QName, steps: &[PathStep]) -> Result<ResolvedPath> {
        let mut owner: &TypeDefinition = self.index.require(root)?;
        let mut children: &[ChildDefinition] = &owner.children;
        let mut segments: Vec<PathSegment> = vec![];
        let mut crossings = vec![];
        let mut guards = vec![];
        let mut node = None;
        let mut is_multiple = false;
        let mut geometry = false;
        let mut substituted = false;
        let mut head: Option<&QName> = None;
        let mut parent: Option<&PropertyDefinition> = None;
        let mut attribute: Option<&PropertyDefinition> = None;

        if steps.is_empty() {
            return Err(Error::UnresolvedPath {
                type_name: root.to_string(),
                path: String::new(),
                step: String::from("(empty)"),
            });
        }

        for (i, step) in steps.iter().enumerate() {
            let unresolved = || Error::UnresolvedPath {
                type_name: root.to_string(),
                path: step_names(&steps[..i]),
                step: step.name.to_string(),
            };
            if attribute.is_some() {
                return Err(unresolved());
            }
            let located = locate(children, &step.name).ok_or_else(unresolved)?;
            if let Some(condition) = &step.condition {
                guards.push(condition.clone());
            }
            if located.repeatable && step.index.is_none() {
                is_multiple = true;
            }

            let property = match located.child {
                ChildDefinition::Group(g) => {
                    if g.repeatable && step.index.is_none() {
                        is_multiple = true;
                    }
                    head = g.substitution_head.as_ref().or(located.head).or(head);
                    children = &g.children;
                    continue;
                }
                ChildDefinition::Property(p) => p,
            };

            if property.attribute {
                attribute = Some(property);
                continue;
            }

            let step_head = located.head.or(head.take());
            let property_type = self.index.property_type(property);

            if let Some(nested) = property_type.filter(|t| t.feature_type && t.name != owner.name)
            {
                crossings.push(Crossing {
                    container_type: owner.name.clone(),
                    container_segments: std::mem::take(&mut segments),
                    nested_type: nested.name.clone(),
                    nested_element: nested.element_name().clone(),
                });
                owner = nested;
                children = &nested.children;
                node = None;
                is_multiple = false;
                geometry = false;
                substituted = false;
                parent = None;
                continue;
            }

            let is_geometry = property_type.map(|t| t.geometry).unwrap_or(false);
            match step_head {
                Some(head_name) if is_geometry => {
                    let folded = parent
                        .and_then(|p| p.type_name.as_ref())
                        .map(|t| is_gml_namespace(t.namespace()))
                        .unwrap_or(false);
                    if !folded {
                        segments.push(PathSegment::new(head_name.clone(), step.index));
                    }
                    node = property.type_name.clone();
                    substituted = true;
                }
                _ => {
                    segments.push(PathSegment::new(property.name.clone(), step.index));
                    node = None;
                    substituted = false;
                }
            }

            geometry = is_geometry;
            if property.repeatable && step.index.is_none() {
                is_multiple = true;
            }
            parent = Some(property);
            children = self.index.property_children(property);
        }

        let placement = match attribute {
            None => Placement::Element,
            Some(a) if is_gml_id(&a.name) && (segments.is_empty() || substituted) => Placement::Id,
            Some(a) => Placement::ClientProperty(a.name.clone()),
        };

        Ok(ResolvedPath {
            owner_type: owner.name.clone(),
            segments,
            node,
            placement,
            is_multiple,
            guards,
            geometry,
            crossings,
            last_element: parent.cloned(),
        })
    }
}

fn step_names(steps: &[PathStep]) -> String {
    steps
        .iter()
        .map(|s| s.name.local_name())
        .collect::<Vec<_>>()
        .join("/")
}
