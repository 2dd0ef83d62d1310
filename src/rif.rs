//! Rule-interchange translation
//!
//! Each cell of an alignment becomes one rule in RIF presentation syntax.
//! The body binds the source entities and carries their conditions; the
//! head states the target membership (type cells) or the target slot the
//! function's result lands in (property cells).
//!
//! Conditions translate as follows:
//!
//! | Condition | Formula |
//! |-----------|---------|
//! | `and` / `or` / `not` | `And(..)` / `Or(..)` / `Not(..)` |
//! | string `a == b` | `External(func:compare(a b)) = 0` |
//! | numeric `a == b` | `External(pred:numeric-equal(a b))` |
//! | `a contains b` | `External(pred:contains(a b))` |

use crate::alignment::{Alignment, Cell, EntityRef};
use crate::condition::{ComparisonOp, ConditionNode, LiteralValue, LogicalOp, Operand};
use crate::config::CompilerConfig;
use crate::schema::QName;
use std::collections::BTreeMap;
use std::fmt;

const PRED_NS: &str = "http://www.w3.org/2007/rif-builtin-predicate#";
const FUNC_NS: &str = "http://www.w3.org/2007/rif-builtin-function#";
const XS_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// A RIF term
#[derive(Debug, Clone, PartialEq)]
pub enum RifTerm {
    Var(String),
    /// Constant with an optional `xs:` datatype; untyped constants are strings
    Const {
        lexical: String,
        datatype: Option<&'static str>,
    },
    /// Symbol such as `lcv:geometry` or local `_unit_id`
    Symbol(String),
    External {
        function: String,
        args: Vec<RifTerm>,
    },
}

impl RifTerm {
    fn var(name: &str) -> Self {
        RifTerm::Var(name.to_string())
    }

    fn literal(value: &LiteralValue) -> Self {
        let datatype = match value {
            LiteralValue::Integer(_) => Some("xs:integer"),
            LiteralValue::Double(_) => Some("xs:double"),
            LiteralValue::String(_) => None,
        };
        RifTerm::Const {
            lexical: value.to_string(),
            datatype,
        }
    }
}

impl fmt::Display for RifTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RifTerm::Var(name) => write!(f, "?{}", name),
            RifTerm::Const { lexical, datatype } => {
                write!(f, "\"{}\"", lexical.replace('\\', "\\\\").replace('"', "\\\""))?;
                match datatype {
                    Some(dt) => write!(f, "^^{}", dt),
                    None => Ok(()),
                }
            }
            RifTerm::Symbol(symbol) => write!(f, "{}", symbol),
            RifTerm::External { function, args } => {
                write!(f, "External({}({}))", function, join(args))
            }
        }
    }
}

/// A RIF formula
#[derive(Debug, Clone, PartialEq)]
pub enum RifFormula {
    And(Vec<RifFormula>),
    Or(Vec<RifFormula>),
    Not(Box<RifFormula>),
    Equal(RifTerm, RifTerm),
    /// Built-in predicate call
    External {
        predicate: String,
        args: Vec<RifTerm>,
    },
    /// `object # class`
    Member { object: RifTerm, class: RifTerm },
    /// `object[slot -> value]`
    Frame {
        object: RifTerm,
        slot: RifTerm,
        value: RifTerm,
    },
}

impl RifFormula {
    fn predicate(name: &str, args: Vec<RifTerm>) -> Self {
        RifFormula::External {
            predicate: format!("pred:{}", name),
            args,
        }
    }

    /// `External(func:compare(a b)) = n`
    fn compare(left: RifTerm, right: RifTerm, n: i64) -> Self {
        RifFormula::Equal(
            RifTerm::External {
                function: "func:compare".into(),
                args: vec![left, right],
            },
            RifTerm::literal(&LiteralValue::Integer(n)),
        )
    }

    fn negate(self) -> Self {
        RifFormula::Not(Box::new(self))
    }

    /// Translate a condition tree
    ///
    /// Property operands become variables named after the property.
    pub fn from_condition(node: &ConditionNode) -> Self {
        match node {
            ConditionNode::Logical { op, children } => {
                let mut formulas: Vec<RifFormula> =
                    children.iter().map(RifFormula::from_condition).collect();
                match op {
                    LogicalOp::And => RifFormula::And(formulas),
                    LogicalOp::Or => RifFormula::Or(formulas),
                    LogicalOp::Not => match formulas.len() {
                        1 => formulas.remove(0).negate(),
                        _ => RifFormula::And(formulas).negate(),
                    },
                }
            }
            ConditionNode::Comparison {
                left,
                op,
                right,
                negated,
            } => {
                let formula = comparison(left, *op, right);
                if *negated {
                    formula.negate()
                } else {
                    formula
                }
            }
            // And() is true, Or() is false
            ConditionNode::Literal(value) => {
                let falsy = match value {
                    LiteralValue::Integer(i) => *i == 0,
                    LiteralValue::Double(d) => *d == 0.0,
                    LiteralValue::String(s) => s.is_empty() || s.eq_ignore_ascii_case("false"),
                };
                if falsy {
                    RifFormula::Or(vec![])
                } else {
                    RifFormula::And(vec![])
                }
            }
        }
    }
}

fn operand_term(operand: &Operand) -> RifTerm {
    match operand {
        Operand::Property(name) => RifTerm::var(&variable_name(name)),
        Operand::Literal(value) => RifTerm::literal(value),
    }
}

fn comparison(left: &Operand, op: ComparisonOp, right: &Operand) -> RifFormula {
    let numeric = [left, right]
        .iter()
        .filter_map(|o| o.literal())
        .any(|lit| lit.is_numeric());
    let (l, r) = (operand_term(left), operand_term(right));

    if op == ComparisonOp::Contains {
        return RifFormula::predicate("contains", vec![l, r]);
    }
    if numeric {
        let name = match op {
            ComparisonOp::Equal => "numeric-equal",
            ComparisonOp::NotEqual => "numeric-not-equal",
            ComparisonOp::LessThan => "numeric-less-than",
            ComparisonOp::LessOrEqual => "numeric-less-than-or-equal",
            ComparisonOp::GreaterThan => "numeric-greater-than",
            ComparisonOp::GreaterOrEqual => "numeric-greater-than-or-equal",
            ComparisonOp::Contains => "contains",
        };
        return RifFormula::predicate(name, vec![l, r]);
    }
    match op {
        ComparisonOp::Equal => RifFormula::compare(l, r, 0),
        ComparisonOp::NotEqual => RifFormula::compare(l, r, 0).negate(),
        ComparisonOp::LessThan => RifFormula::compare(l, r, -1),
        ComparisonOp::GreaterThan => RifFormula::compare(l, r, 1),
        ComparisonOp::LessOrEqual => RifFormula::compare(l, r, 1).negate(),
        ComparisonOp::GreaterOrEqual => RifFormula::compare(l, r, -1).negate(),
        ComparisonOp::Contains => RifFormula::predicate("contains", vec![l, r]),
    }
}

impl fmt::Display for RifFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RifFormula::And(children) => write!(f, "And({})", join(children)),
            RifFormula::Or(children) => write!(f, "Or({})", join(children)),
            RifFormula::Not(child) => write!(f, "Not({})", child),
            RifFormula::Equal(left, right) => write!(f, "{} = {}", left, right),
            RifFormula::External { predicate, args } => {
                write!(f, "External({}({}))", predicate, join(args))
            }
            RifFormula::Member { object, class } => write!(f, "{} # {}", object, class),
            RifFormula::Frame {
                object,
                slot,
                value,
            } => write!(f, "{}[{} -> {}]", object, slot, value),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Variable name for a property path: `a/b-c` becomes `a_b_c`
fn variable_name(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// One translated cell
#[derive(Debug, Clone, PartialEq)]
pub struct RifRule {
    pub id: String,
    pub variables: Vec<String>,
    pub head: RifFormula,
    pub body: RifFormula,
}

impl fmt::Display for RifRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars: Vec<String> = self.variables.iter().map(|v| format!("?{}", v)).collect();
        writeln!(f, "(* \"{}\" *)", self.id)?;
        writeln!(f, "Forall {} (", vars.join(" "))?;
        writeln!(f, "  {} :- {}", self.head, self.body)?;
        write!(f, ")")
    }
}

/// A translated alignment
#[derive(Debug, Clone, PartialEq)]
pub struct RifDocument {
    /// prefix -> namespace, sorted by prefix
    pub prefixes: BTreeMap<String, String>,
    pub rules: Vec<RifRule>,
}

impl fmt::Display for RifDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document(")?;
        for (prefix, uri) in &self.prefixes {
            writeln!(f, "  Prefix({} <{}>)", prefix, uri)?;
        }
        writeln!(f, "  Group(")?;
        for rule in &self.rules {
            for line in rule.to_string().lines() {
                writeln!(f, "    {}", line)?;
            }
        }
        writeln!(f, "  )")?;
        write!(f, ")")
    }
}

/// Assigns prefixes to namespaces while rendering symbols
struct SymbolTable<'c> {
    config: &'c CompilerConfig,
    prefixes: BTreeMap<String, String>,
}

impl<'c> SymbolTable<'c> {
    fn new(config: &'c CompilerConfig) -> Self {
        let mut prefixes = BTreeMap::new();
        prefixes.insert("pred".to_string(), PRED_NS.to_string());
        prefixes.insert("func".to_string(), FUNC_NS.to_string());
        prefixes.insert("xs".to_string(), XS_NS.to_string());
        Self { config, prefixes }
    }

    fn prefix(&mut self, uri: &str) -> String {
        if let Some((prefix, _)) = self.prefixes.iter().find(|(_, u)| u.as_str() == uri) {
            return prefix.clone();
        }
        let mut prefix = self
            .config
            .preferred_prefix(uri)
            .map(str::to_string)
            .unwrap_or_else(|| format!("ns{}", self.prefixes.len() - 2));
        while self.prefixes.contains_key(&prefix) {
            prefix.push('_');
        }
        self.prefixes.insert(prefix.clone(), uri.to_string());
        prefix
    }

    /// `prefix:local`, or the local constant `_local` for unqualified names
    fn symbol(&mut self, name: &QName) -> RifTerm {
        if name.is_qualified() {
            let prefix = self.prefix(name.namespace());
            RifTerm::Symbol(format!("{}:{}", prefix, name.local_name()))
        } else {
            RifTerm::Symbol(format!("_{}", variable_name(name.local_name())))
        }
    }
}

/// Accumulates the variables and body formulas of one rule
#[derive(Default)]
struct RuleBuilder {
    variables: Vec<String>,
    body: Vec<RifFormula>,
}

impl RuleBuilder {
    fn variable(&mut self, name: String) -> RifTerm {
        if !self.variables.contains(&name) {
            self.variables.push(name.clone());
        }
        RifTerm::Var(name)
    }

    /// Bind a source entity: membership, one frame per path step, and its conditions
    fn bind_source(&mut self, symbols: &mut SymbolTable<'_>, index: usize, entity: &EntityRef) -> RifTerm {
        let subject = self.variable(format!("s{}", index));
        self.body.push(RifFormula::Member {
            object: subject.clone(),
            class: symbols.symbol(&entity.type_name),
        });

        let mut object = subject.clone();
        let mut walked: Vec<&str> = Vec::new();
        for step in &entity.path {
            walked.push(step.name.local_name());
            let value = self.variable(variable_name(&walked.join("/")));
            self.body.push(RifFormula::Frame {
                object,
                slot: symbols.symbol(&step.name),
                value: value.clone(),
            });
            if let Some(condition) = &step.condition {
                self.condition(symbols, &subject, condition);
            }
            object = value;
        }
        if let Some(condition) = &entity.condition {
            self.condition(symbols, &subject, condition);
        }
        object
    }

    /// Bind the properties a condition reads on `subject`, then add the condition
    fn condition(&mut self, symbols: &mut SymbolTable<'_>, subject: &RifTerm, node: &ConditionNode) {
        for property in node.properties() {
            let value = self.variable(variable_name(&property));
            let frame = RifFormula::Frame {
                object: subject.clone(),
                slot: symbols.symbol(&QName::unqualified(&property)),
                value,
            };
            if !self.body.contains(&frame) {
                self.body.push(frame);
            }
        }
        self.body.push(RifFormula::from_condition(node));
    }
}

/// Translate one cell
pub fn translate_cell(cell: &Cell, config: &CompilerConfig) -> (RifRule, BTreeMap<String, String>) {
    let mut symbols = SymbolTable::new(config);
    let rule = build_rule(cell, &mut symbols);
    (rule, symbols.prefixes)
}

fn build_rule(cell: &Cell, symbols: &mut SymbolTable<'_>) -> RifRule {
    let mut builder = RuleBuilder::default();
    let values: Vec<RifTerm> = cell
        .source
        .iter()
        .enumerate()
        .map(|(i, source)| builder.bind_source(symbols, i, source))
        .collect();

    let target = builder.variable("t".into());
    let head = match cell.target.first() {
        Some(entity) if entity.is_type() => RifFormula::Member {
            object: target,
            class: symbols.symbol(&entity.type_name),
        },
        Some(entity) => {
            let mut args = values;
            for name in cell.parameters.names() {
                for value in cell.parameters.get_all(name) {
                    if let Some(literal) = value.as_literal() {
                        args.push(RifTerm::literal(literal));
                    }
                }
            }
            let slot = entity
                .path
                .iter()
                .map(|step| match symbols.symbol(&step.name) {
                    RifTerm::Symbol(s) => s,
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("/");
            RifFormula::Frame {
                object: target,
                slot: RifTerm::Symbol(slot),
                value: RifTerm::External {
                    function: format!("func:{}", cell.function),
                    args,
                },
            }
        }
        None => RifFormula::And(vec![]),
    };

    RifRule {
        id: cell.id.clone(),
        variables: builder.variables,
        head,
        body: RifFormula::And(builder.body),
    }
}

/// Translate every cell of an alignment
pub fn translate(alignment: &Alignment, config: &CompilerConfig) -> RifDocument {
    let mut symbols = SymbolTable::new(config);
    let rules = alignment
        .cells
        .iter()
        .map(|cell| build_rule(cell, &mut symbols))
        .collect();
    RifDocument {
        prefixes: symbols.prefixes,
        rules,
    }
}
