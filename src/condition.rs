//! Condition trees
//!
//! A condition is a recursive predicate: logical composites over children,
//! comparison leaves and literal leaves. Conditions restrict where a rule
//! applies (guards on path steps and source entities) and are translated
//! to rule-interchange formulas by [`crate::rif`].
//!
//! ```yaml
//! logical:
//!   op: and
//!   children:
//!     - comparison:
//!         left: { property: status }
//!         op: equal
//!         right: { literal: active }
//!     - comparison:
//!         left: { property: lanes }
//!         op: greater_than
//!         right: { literal: 2 }
//! ```

use crate::error::{Error, Result};
use crate::expression::Expr;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A node of a condition tree
///
/// Serialized as a map with exactly one of the keys `logical`,
/// `comparison` or `literal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConditionRepr", into = "ConditionRepr")]
pub enum ConditionNode {
    Logical {
        op: LogicalOp,
        children: Vec<ConditionNode>,
    },
    Comparison {
        left: Operand,
        op: ComparisonOp,
        right: Operand,
        negated: bool,
    },
    Literal(LiteralValue),
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct ConditionRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logical: Option<LogicalRepr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comparison: Option<ComparisonRepr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    literal: Option<LiteralValue>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct LogicalRepr {
    op: LogicalOp,
    children: Vec<ConditionNode>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct ComparisonRepr {
    left: Operand,
    op: ComparisonOp,
    right: Operand,
    #[serde(default, skip_serializing_if = "is_false")]
    negated: bool,
}

impl TryFrom<ConditionRepr> for ConditionNode {
    type Error = String;

    fn try_from(repr: ConditionRepr) -> std::result::Result<Self, String> {
        match (repr.logical, repr.comparison, repr.literal) {
            (Some(l), None, None) => Ok(ConditionNode::Logical {
                op: l.op,
                children: l.children,
            }),
            (None, Some(c), None) => Ok(ConditionNode::Comparison {
                left: c.left,
                op: c.op,
                right: c.right,
                negated: c.negated,
            }),
            (None, None, Some(lit)) => Ok(ConditionNode::Literal(lit)),
            _ => Err("a condition needs exactly one of logical, comparison or literal".into()),
        }
    }
}

impl From<ConditionNode> for ConditionRepr {
    fn from(node: ConditionNode) -> Self {
        let mut repr = ConditionRepr {
            logical: None,
            comparison: None,
            literal: None,
        };
        match node {
            ConditionNode::Logical { op, children } => {
                repr.logical = Some(LogicalRepr { op, children })
            }
            ConditionNode::Comparison {
                left,
                op,
                right,
                negated,
            } => {
                repr.comparison = Some(ComparisonRepr {
                    left,
                    op,
                    right,
                    negated,
                })
            }
            ConditionNode::Literal(lit) => repr.literal = Some(lit),
        }
        repr
    }
}

impl JsonSchema for ConditionNode {
    fn schema_name() -> Cow<'static, str> {
        "ConditionNode".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        ConditionRepr::json_schema(generator)
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl std::fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOp::And => write!(f, "And"),
            LogicalOp::Or => write!(f, "Or"),
            LogicalOp::Not => write!(f, "Not"),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    #[serde(alias = "==", alias = "eq")]
    Equal,
    #[serde(alias = "!=", alias = "ne")]
    NotEqual,
    #[serde(alias = "<", alias = "lt")]
    LessThan,
    #[serde(alias = "<=", alias = "le")]
    LessOrEqual,
    #[serde(alias = ">", alias = "gt")]
    GreaterThan,
    #[serde(alias = ">=", alias = "ge")]
    GreaterOrEqual,
    Contains,
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonOp::Equal => write!(f, "=="),
            ComparisonOp::NotEqual => write!(f, "!="),
            ComparisonOp::LessThan => write!(f, "<"),
            ComparisonOp::LessOrEqual => write!(f, "<="),
            ComparisonOp::GreaterThan => write!(f, ">"),
            ComparisonOp::GreaterOrEqual => write!(f, ">="),
            ComparisonOp::Contains => write!(f, "contains"),
        }
    }
}

/// Comparison operand, `{ property: name }` or `{ literal: value }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OperandRepr", into = "OperandRepr")]
pub enum Operand {
    /// Source property name
    Property(String),
    Literal(LiteralValue),
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct OperandRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    literal: Option<LiteralValue>,
}

impl TryFrom<OperandRepr> for Operand {
    type Error = String;

    fn try_from(repr: OperandRepr) -> std::result::Result<Self, String> {
        match (repr.property, repr.literal) {
            (Some(name), None) => Ok(Operand::Property(name)),
            (None, Some(lit)) => Ok(Operand::Literal(lit)),
            _ => Err("an operand needs exactly one of property or literal".into()),
        }
    }
}

impl From<Operand> for OperandRepr {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Property(name) => OperandRepr {
                property: Some(name),
                literal: None,
            },
            Operand::Literal(lit) => OperandRepr {
                property: None,
                literal: Some(lit),
            },
        }
    }
}

impl JsonSchema for Operand {
    fn schema_name() -> Cow<'static, str> {
        "Operand".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        OperandRepr::json_schema(generator)
    }
}

/// Literal kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LiteralKind {
    String,
    Integer,
    Double,
}

/// A literal; the variant carries its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LiteralValue {
    Integer(i64),
    Double(f64),
    String(String),
}

impl LiteralValue {
    pub fn kind(&self) -> LiteralKind {
        match self {
            LiteralValue::Integer(_) => LiteralKind::Integer,
            LiteralValue::Double(_) => LiteralKind::Double,
            LiteralValue::String(_) => LiteralKind::String,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, LiteralValue::String(_))
    }

    /// Number-shaped text (optional minus sign, digits, at most one decimal
    /// point) becomes a number when it renders back to the same text.
    /// Anything else, `inf` and `NaN` included, stays a string.
    pub fn from_text(text: &str) -> Self {
        let unsigned = text.strip_prefix('-').unwrap_or(text);
        let number_shaped = !unsigned.is_empty()
            && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
            && unsigned.matches('.').count() <= 1
            && !unsigned.starts_with('.')
            && !unsigned.ends_with('.');
        if number_shaped {
            if let Ok(i) = text.parse::<i64>() {
                if i.to_string() == text {
                    return LiteralValue::Integer(i);
                }
            }
            if let Ok(d) = text.parse::<f64>() {
                if format!("{:?}", d) == text {
                    return LiteralValue::Double(d);
                }
            }
        }
        LiteralValue::String(text.to_string())
    }

    /// NaN and infinities have no literal form in either output language
    pub fn is_finite(&self) -> bool {
        match self {
            LiteralValue::Double(d) => d.is_finite(),
            _ => true,
        }
    }

    /// Expression for this literal: numbers bare, strings quoted
    pub fn to_expr(&self) -> Expr {
        match self {
            LiteralValue::String(s) => Expr::string(s),
            other => Expr::number(other.to_string()),
        }
    }
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Integer(i) => write!(f, "{}", i),
            LiteralValue::Double(d) => write!(f, "{:?}", d),
            LiteralValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::String(s.to_string())
    }
}

impl From<i64> for LiteralValue {
    fn from(i: i64) -> Self {
        LiteralValue::Integer(i)
    }
}

impl From<i32> for LiteralValue {
    fn from(i: i32) -> Self {
        LiteralValue::Integer(i64::from(i))
    }
}

impl From<f64> for LiteralValue {
    fn from(d: f64) -> Self {
        LiteralValue::Double(d)
    }
}

impl Operand {
    pub fn to_expr(&self) -> Expr {
        match self {
            Operand::Property(name) => Expr::property(name),
            Operand::Literal(lit) => lit.to_expr(),
        }
    }

    pub fn literal(&self) -> Option<&LiteralValue> {
        match self {
            Operand::Literal(lit) => Some(lit),
            Operand::Property(_) => None,
        }
    }
}

impl ConditionNode {
    pub fn and(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Logical {
            op: LogicalOp::And,
            children,
        }
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Logical {
            op: LogicalOp::Or,
            children,
        }
    }

    pub fn not(child: ConditionNode) -> Self {
        ConditionNode::Logical {
            op: LogicalOp::Not,
            children: vec![child],
        }
    }

    pub fn compare(left: Operand, op: ComparisonOp, right: Operand) -> Self {
        ConditionNode::Comparison {
            left,
            op,
            right,
            negated: false,
        }
    }

    /// `property == literal`
    pub fn property_equals(property: &str, value: impl Into<LiteralValue>) -> Self {
        Self::compare(
            Operand::Property(property.to_string()),
            ComparisonOp::Equal,
            Operand::Literal(value.into()),
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, ConditionNode::Logical { .. })
    }

    /// Check structural well-formedness
    pub fn validate(&self) -> Result<()> {
        match self {
            ConditionNode::Logical { op, children } => {
                match op {
                    LogicalOp::Not if children.len() != 1 => {
                        return Err(Error::InvalidCondition(format!(
                            "Not takes exactly one child, got {}",
                            children.len()
                        )))
                    }
                    LogicalOp::And | LogicalOp::Or if children.is_empty() => {
                        return Err(Error::InvalidCondition(format!(
                            "{} without children",
                            op
                        )))
                    }
                    _ => {}
                }
                children.iter().try_for_each(|c| c.validate())
            }
            ConditionNode::Comparison {
                left, op, right, ..
            } => {
                if let Some(lit) = [left, right]
                    .iter()
                    .filter_map(|o| o.literal())
                    .find(|lit| !lit.is_finite())
                {
                    return Err(Error::InvalidCondition(format!(
                        "non-finite literal {}",
                        lit
                    )));
                }
                if *op == ComparisonOp::Contains {
                    let non_string = [left, right]
                        .iter()
                        .filter_map(|o| o.literal())
                        .any(|lit| lit.is_numeric());
                    if non_string {
                        return Err(Error::InvalidCondition(
                            "contains compares strings only".into(),
                        ));
                    }
                }
                Ok(())
            }
            ConditionNode::Literal(lit) if !lit.is_finite() => Err(Error::InvalidCondition(
                format!("non-finite literal {}", lit),
            )),
            ConditionNode::Literal(_) => Ok(()),
        }
    }

    /// Property names referenced anywhere in the tree
    pub fn properties(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_properties(&mut names);
        names
    }

    fn collect_properties(&self, names: &mut Vec<String>) {
        match self {
            ConditionNode::Logical { children, .. } => {
                for child in children {
                    child.collect_properties(names);
                }
            }
            ConditionNode::Comparison { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Property(name) = operand {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                }
            }
            ConditionNode::Literal(_) => {}
        }
    }

    /// Translate to a boolean query expression
    pub fn to_expr(&self) -> Expr {
        match self {
            ConditionNode::Logical { op, children } => {
                let mut args: Vec<Expr> = children.iter().map(|c| c.to_expr()).collect();
                match op {
                    LogicalOp::Not => Expr::call("not", args),
                    LogicalOp::And | LogicalOp::Or if args.len() == 1 => args.remove(0),
                    LogicalOp::And => fold_binary("and", args),
                    LogicalOp::Or => fold_binary("or", args),
                }
            }
            ConditionNode::Comparison {
                left,
                op,
                right,
                negated,
            } => {
                let l = left.to_expr();
                let r = right.to_expr();
                let cmp = match op {
                    ComparisonOp::Equal => Expr::call("equalTo", vec![l, r]),
                    ComparisonOp::NotEqual => Expr::call("notEqualTo", vec![l, r]),
                    ComparisonOp::LessThan => Expr::call("lessThan", vec![l, r]),
                    ComparisonOp::LessOrEqual => Expr::call("lessEqualThan", vec![l, r]),
                    ComparisonOp::GreaterThan => Expr::call("greaterThan", vec![l, r]),
                    ComparisonOp::GreaterOrEqual => Expr::call("greaterEqualThan", vec![l, r]),
                    ComparisonOp::Contains => Expr::call(
                        "greaterEqualThan",
                        vec![Expr::call("strIndexOf", vec![l, r]), Expr::number("0")],
                    ),
                };
                if *negated {
                    Expr::call("not", vec![cmp])
                } else {
                    cmp
                }
            }
            ConditionNode::Literal(lit) => lit.to_expr(),
        }
    }
}

/// Left-nested binary application: f(f(a, b), c)
fn fold_binary(name: &str, args: Vec<Expr>) -> Expr {
    let mut iter = args.into_iter();
    let first = iter.next().unwrap_or(Expr::Nil);
    iter.fold(first, |acc, next| Expr::call(name, vec![acc, next]))
}
