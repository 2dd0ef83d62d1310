//! Classification: recode source values through a lookup table

use super::property;
use crate::alignment::Cell;
use crate::context::MappingContext;
use crate::error::{Error, Result};
use crate::expression::Expr;
use std::str::FromStr;

pub(super) const PARAMETER_LOOKUP_TABLE: &str = "lookupTable";
pub(super) const PARAMETER_NOT_CLASSIFIED: &str = "notClassifiedAction";

const FIXED_PREFIX: &str = "fixed:";

/// What to emit for a source value missing from the lookup table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NotClassifiedAction {
    /// Pass the source value through
    UseSource,
    /// Emit no value
    #[default]
    UseNull,
    /// Emit a constant
    Fixed(String),
}

impl FromStr for NotClassifiedAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source" => Ok(NotClassifiedAction::UseSource),
            "null" => Ok(NotClassifiedAction::UseNull),
            _ => match s.strip_prefix(FIXED_PREFIX) {
                Some(value) => Ok(NotClassifiedAction::Fixed(value.to_string())),
                None => Err(Error::InvalidParameter {
                    function: "classification".into(),
                    parameter: PARAMETER_NOT_CLASSIFIED.into(),
                    message: format!(
                        "unrecognised action '{}', expected source, null or {}<value>",
                        s, FIXED_PREFIX
                    ),
                }),
            },
        }
    }
}

impl std::fmt::Display for NotClassifiedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotClassifiedAction::UseSource => write!(f, "source"),
            NotClassifiedAction::UseNull => write!(f, "null"),
            NotClassifiedAction::Fixed(value) => write!(f, "{}{}", FIXED_PREFIX, value),
        }
    }
}

impl NotClassifiedAction {
    fn fallback(&self, source: &Expr) -> Expr {
        match self {
            NotClassifiedAction::UseSource => source.clone(),
            NotClassifiedAction::UseNull => Expr::Nil,
            NotClassifiedAction::Fixed(value) => Expr::string(value),
        }
    }
}

pub(super) fn expression(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<Expr> {
    let source = property::primary_source_property(ctx, cell)?;

    let table = cell
        .parameter(PARAMETER_LOOKUP_TABLE)
        .ok_or_else(|| Error::MissingParameter {
            function: cell.function.clone(),
            parameter: PARAMETER_LOOKUP_TABLE.into(),
        })?
        .as_lookup()
        .ok_or_else(|| Error::InvalidParameter {
            function: cell.function.clone(),
            parameter: PARAMETER_LOOKUP_TABLE.into(),
            message: "expected a lookup table".into(),
        })?;
    if table.is_empty() {
        return Err(Error::InvalidParameter {
            function: cell.function.clone(),
            parameter: PARAMETER_LOOKUP_TABLE.into(),
            message: "lookup table is empty".into(),
        });
    }

    let action = match cell.text_parameter(PARAMETER_NOT_CLASSIFIED) {
        Some(text) => text.parse::<NotClassifiedAction>()?,
        None => NotClassifiedAction::default(),
    };

    if let Some((key, _)) = table.entries().iter().find(|(key, _)| !key.is_finite()) {
        return Err(Error::InvalidParameter {
            function: cell.function.clone(),
            parameter: PARAMETER_LOOKUP_TABLE.into(),
            message: format!("lookup key {} is not a finite number", key),
        });
    }

    let keys = table.entries().iter().map(|(key, _)| key.to_expr()).collect();
    let pairs = table
        .entries()
        .iter()
        .map(|(key, value)| (key.to_expr(), Expr::string(value)))
        .collect();

    Ok(Expr::if_then_else(
        Expr::in_list(source.clone(), keys),
        Expr::recode(source.clone(), pairs),
        action.fallback(&source),
    ))
}
