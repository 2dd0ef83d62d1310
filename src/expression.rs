//! Query expression builder
//!
//! Attribute mappings carry OCQL-style expressions. They are composed as a
//! small AST and rendered once, so nesting order and literal quoting are
//! decided in one place:
//!
//! | Form | Rendering |
//! |------|-----------|
//! | string literal | `'text'` (embedded quotes doubled) |
//! | concatenation | `strConcat(a, b)` |
//! | conditional | `if_then_else(cond, a, b)` |
//! | null test | `isNull(x)` |
//! | membership | `in(x,v1,...,vn)` |
//! | recoding | `Recode(x,k1,'t1',...)` |
//! | date parsing | `dateParse(x, 'fmt')` |
//! | no value | `Expression.NIL` |

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Sentinel for "no value"
pub const NIL: &str = "Expression.NIL";

/// A query expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Source property reference
    Property(String),
    /// String literal, quoted on rendering
    String(String),
    /// Numeric literal, rendered as-is
    Number(String),
    /// Verbatim expression text
    Raw(String),
    /// No value
    Nil,
    /// Function application; compact calls omit the space after commas
    Call {
        name: String,
        args: Vec<Expr>,
        compact: bool,
    },
}

impl Expr {
    pub fn property(name: &str) -> Self {
        Expr::Property(name.to_string())
    }

    pub fn string(value: &str) -> Self {
        Expr::String(value.to_string())
    }

    pub fn number(value: impl Into<String>) -> Self {
        Expr::Number(value.into())
    }

    pub fn raw(text: &str) -> Self {
        Expr::Raw(text.to_string())
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
            compact: false,
        }
    }

    fn compact_call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
            compact: true,
        }
    }

    pub fn str_concat(left: Expr, right: Expr) -> Self {
        Self::call("strConcat", vec![left, right])
    }

    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::call("if_then_else", vec![condition, then, otherwise])
    }

    pub fn is_null(value: Expr) -> Self {
        Self::call("isNull", vec![value])
    }

    pub fn in_list(value: Expr, candidates: Vec<Expr>) -> Self {
        let mut args = vec![value];
        args.extend(candidates);
        Self::compact_call("in", args)
    }

    pub fn recode(value: Expr, pairs: Vec<(Expr, Expr)>) -> Self {
        let mut args = vec![value];
        for (from, to) in pairs {
            args.push(from);
            args.push(to);
        }
        Self::compact_call("Recode", args)
    }

    pub fn date_parse(value: Expr, format: &str) -> Self {
        Self::call("dateParse", vec![value, Expr::string(format)])
    }

    /// Emit `self` only where `guard` holds
    pub fn guarded(self, guard: Expr) -> Self {
        Self::if_then_else(guard, self, Expr::Nil)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Property(name) => write!(f, "{}", name),
            Expr::String(value) => write!(f, "{}", quote(value)),
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Raw(text) => write!(f, "{}", text),
            Expr::Nil => write!(f, "{}", NIL),
            Expr::Call {
                name,
                args,
                compact,
            } => {
                let sep = if *compact { "," } else { ", " };
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, rendered.join(sep))
            }
        }
    }
}

/// Quote a string literal, doubling embedded single quotes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A piece of a format pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Literal(String),
    Variable(String),
}

/// A `{name}` placeholder pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPattern {
    fragments: Vec<Fragment>,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("valid placeholder regex"))
}

impl FormatPattern {
    pub fn parse(pattern: &str) -> Self {
        let mut fragments = Vec::new();
        let mut last = 0;
        for caps in placeholder_regex().captures_iter(pattern) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                fragments.push(Fragment::Literal(pattern[last..whole.start()].to_string()));
            }
            fragments.push(Fragment::Variable(name.as_str().trim().to_string()));
            last = whole.end();
        }
        if last < pattern.len() {
            fragments.push(Fragment::Literal(pattern[last..].to_string()));
        }
        Self { fragments }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Variable names in order of appearance
    pub fn variables(&self) -> Vec<&str> {
        self.fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Variable(name) => Some(name.as_str()),
                Fragment::Literal(_) => None,
            })
            .collect()
    }

    /// Compose as left-nested concatenation, resolving variables with `bind`
    pub fn compose<F>(&self, function: &str, bind: F) -> Result<Expr>
    where
        F: Fn(&str) -> Option<Expr>,
    {
        let mut pieces = Vec::with_capacity(self.fragments.len());
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => pieces.push(Expr::string(text)),
                Fragment::Variable(name) => {
                    let expr = bind(name).ok_or_else(|| Error::InvalidParameter {
                        function: function.to_string(),
                        parameter: "pattern".into(),
                        message: format!("placeholder {{{}}} has no bound variable", name),
                    })?;
                    pieces.push(expr);
                }
            }
        }

        let mut iter = pieces.into_iter();
        let first = iter.next().unwrap_or_else(|| Expr::string(""));
        Ok(iter.fold(first, Expr::str_concat))
    }
}
