//! Module: expr
//! Responsibility: the expression tree produced by guards and grammar
//! fragments, its source rendering, and structural rewriting.
//! Does not own: evaluation (see `predicate`) or text scanning (see `compile`).

mod parse;


pub use parse::MAX_NESTING;
pub(crate) use parse::parse_residual;

use crate::{
    guard::join_chain,
    value::{TextMode, format_number},
    vault::VaultKey,
};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::{convert::Infallible, fmt};

///
/// Literal
///

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Literal {
    /// JSON form; `None` for undefined.
    #[must_use]
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            Self::Undefined => None,
            Self::Null => Some(JsonValue::Null),
            Self::Bool(b) => Some(JsonValue::Bool(*b)),
            Self::Number(n) => {
                Some(serde_json::Number::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number))
            }
            Self::Text(text) => Some(JsonValue::String(text.clone())),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(text) => write!(f, "'{}'", escape_text(text)),
        }
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    /// Loose equality operators map to their strict counterparts.
    #[must_use]
    pub const fn strict(self) -> Self {
        match self {
            Self::Eq => Self::StrictEq,
            Self::Ne => Self::StrictNe,
            other => other,
        }
    }
}

///
/// LogicalOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

///
/// IterMode
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IterMode {
    Some,
    Every,
    Map,
}

impl IterMode {
    const fn method(self) -> &'static str {
        match self {
            Self::Some => "some",
            Self::Every => "every",
            Self::Map => "map",
        }
    }
}

///
/// Anchor
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Anchor {
    #[default]
    None,
    Start,
    End,
}

impl Anchor {
    /// Wrap a pattern source so it only matches at this anchor.
    #[must_use]
    pub fn apply(self, source: &str) -> String {
        match self {
            Self::None => source.to_string(),
            Self::Start => format!("^(?:{source})"),
            Self::End => format!("(?:{source})$"),
        }
    }
}

///
/// CompiledPattern
///
/// Regex compiled ahead of evaluation. Equality compares the final source.
///

#[derive(Clone, Debug)]
pub struct CompiledPattern(Regex);

impl CompiledPattern {
    pub(crate) fn new(source: &str, anchor: Anchor, mode: TextMode) -> Result<Self, regex::Error> {
        let source = anchor.apply(source);
        let regex = match mode {
            TextMode::Cs => Regex::new(&source)?,
            TextMode::Ci => regex::RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()?,
        };

        Ok(Self(regex))
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

///
/// PatternTest
///
/// Regex test of `pattern` against the text form of `subject`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PatternTest {
    pub subject: Box<Expr>,
    pub pattern: Box<Expr>,
    pub anchor: Anchor,
    pub mode: TextMode,
    pub compiled: Option<CompiledPattern>,
}

///
/// Expr
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Protected(VaultKey),
    Lexeme(String),
    Ident(String),
    Local(String),
    Slot {
        index: usize,
        name: String,
    },
    Root(String),
    Member {
        object: Box<Self>,
        path: Vec<String>,
    },
    Defaulted {
        value: Box<Self>,
        text: String,
    },
    ArrayOr(Box<Self>),
    List(Vec<Self>),
    Compare {
        op: CompareOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    Includes {
        list: Box<Self>,
        needle: Box<Self>,
    },
    Pattern(PatternTest),
    Not(Box<Self>),
    /// Flat chain of operands joined by one operator; never fewer than two.
    Logical {
        op: LogicalOp,
        operands: Vec<Self>,
    },
    Call {
        name: String,
        args: Vec<Self>,
    },
    Iterate {
        mode: IterMode,
        over: Box<Self>,
        binder: String,
        body: Box<Self>,
    },
}

impl Expr {
    //
    // constructors
    //

    #[must_use]
    pub const fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Bool(value))
    }

    #[must_use]
    pub const fn number(value: f64) -> Self {
        Self::Literal(Literal::Number(value))
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Text(value.into()))
    }

    #[must_use]
    pub fn lexeme(name: impl Into<String>) -> Self {
        Self::Lexeme(name.into())
    }

    #[must_use]
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    /// Optional-chained access; an empty path returns the object unchanged.
    #[must_use]
    pub fn member(object: Self, path: Vec<String>) -> Self {
        if path.is_empty() {
            return object;
        }

        match object {
            Self::Member {
                object,
                path: mut head,
            } => {
                head.extend(path);
                Self::Member { object, path: head }
            }
            object => Self::Member {
                object: Box::new(object),
                path,
            },
        }
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn includes(list: Self, needle: Self) -> Self {
        Self::Includes {
            list: Box::new(list),
            needle: Box::new(needle),
        }
    }

    #[must_use]
    pub fn pattern(subject: Self, pattern: Self, anchor: Anchor) -> Self {
        Self::Pattern(PatternTest {
            subject: Box::new(subject),
            pattern: Box::new(pattern),
            anchor,
            mode: TextMode::Cs,
            compiled: None,
        })
    }

    #[must_use]
    pub fn negate(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Join two operands, splicing in either side that is already a chain
    /// of the same operator. Long `a || b || ...` runs stay one level deep.
    #[must_use]
    pub fn logical(op: LogicalOp, left: Self, right: Self) -> Self {
        let mut operands = match left {
            Self::Logical { op: inner, operands } if inner == op => operands,
            other => vec![other],
        };
        match right {
            Self::Logical { op: inner, operands: tail } if inner == op => operands.extend(tail),
            other => operands.push(other),
        }

        Self::Logical { op, operands }
    }

    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn iterate(mode: IterMode, over: Self, binder: impl Into<String>, body: Self) -> Self {
        Self::Iterate {
            mode,
            over: Box::new(over),
            binder: binder.into(),
            body: Box::new(body),
        }
    }

    //
    // traversal
    //

    /// Rebuild the tree bottom-up, applying `f` to every node after its
    /// children.
    #[must_use]
    pub fn rewrite(self, f: &mut impl FnMut(Self) -> Self) -> Self {
        match self.try_rewrite(&mut |node| Ok::<_, Infallible>(f(node))) {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`Expr::rewrite`]; stops at the first error.
    pub fn try_rewrite<E>(self, f: &mut impl FnMut(Self) -> Result<Self, E>) -> Result<Self, E> {
        let node = match self {
            Self::Member { object, path } => Self::Member {
                object: Box::new(object.try_rewrite(f)?),
                path,
            },
            Self::Defaulted { value, text } => Self::Defaulted {
                value: Box::new(value.try_rewrite(f)?),
                text,
            },
            Self::ArrayOr(inner) => Self::ArrayOr(Box::new(inner.try_rewrite(f)?)),
            Self::List(items) => Self::List(try_rewrite_all(items, f)?),
            Self::Compare { op, left, right } => Self::Compare {
                op,
                left: Box::new(left.try_rewrite(f)?),
                right: Box::new(right.try_rewrite(f)?),
            },
            Self::Includes { list, needle } => Self::Includes {
                list: Box::new(list.try_rewrite(f)?),
                needle: Box::new(needle.try_rewrite(f)?),
            },
            Self::Pattern(test) => Self::Pattern(PatternTest {
                subject: Box::new(test.subject.try_rewrite(f)?),
                pattern: Box::new(test.pattern.try_rewrite(f)?),
                ..test
            }),
            Self::Not(inner) => Self::Not(Box::new(inner.try_rewrite(f)?)),
            Self::Logical { op, operands } => Self::Logical {
                op,
                operands: try_rewrite_all(operands, f)?,
            },
            Self::Call { name, args } => Self::Call {
                name,
                args: try_rewrite_all(args, f)?,
            },
            Self::Iterate {
                mode,
                over,
                binder,
                body,
            } => Self::Iterate {
                mode,
                over: Box::new(over.try_rewrite(f)?),
                binder,
                body: Box::new(body.try_rewrite(f)?),
            },
            leaf => leaf,
        };

        f(node)
    }

    /// Replace every `Lexeme(name)` placeholder present in `values`.
    #[must_use]
    pub fn substitute(self, values: &impl Fn(&str) -> Option<Self>) -> Self {
        self.rewrite(&mut |node| match node {
            Self::Lexeme(name) => values(&name).unwrap_or(Self::Lexeme(name)),
            other => other,
        })
    }

    // precedence used when rendering nested binary nodes
    const fn binds_tightly(&self) -> bool {
        !matches!(self, Self::Compare { .. } | Self::Logical { .. } | Self::Not(_))
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.binds_tightly() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }
}

impl From<Literal> for Expr {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Protected(key) => write!(f, "{key}"),
            Self::Lexeme(name)
            | Self::Ident(name)
            | Self::Local(name)
            | Self::Root(name)
            | Self::Slot { name, .. } => f.write_str(name),
            Self::Member { object, path } => {
                let head = object.to_string();
                let mut parts = Vec::with_capacity(path.len() + 1);
                parts.push(head.as_str());
                parts.extend(path.iter().map(String::as_str));

                f.write_str(&join_chain(&parts, !object.binds_tightly()))
            }
            Self::Defaulted { value, text } => write!(
                f,
                "(typeof {value} === 'undefined' ? '{}' : {value})",
                escape_text(text)
            ),
            Self::ArrayOr(inner) => write!(f, "({inner} instanceof Array ? {inner} : [])"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Compare { op, left, right } => {
                left.fmt_operand(f)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_operand(f)
            }
            Self::Logical { op, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    operand.fmt_operand(f)?;
                }
                Ok(())
            }
            Self::Includes { list, needle } => write!(f, "{list}.includes({needle})"),
            Self::Pattern(test) => {
                let flags = match test.mode {
                    TextMode::Cs => "",
                    TextMode::Ci => "i",
                };
                match test.pattern.as_ref() {
                    Self::Literal(Literal::Text(source)) => write!(
                        f,
                        "/{}/{flags}.test({})",
                        test.anchor.apply(source),
                        test.subject
                    ),
                    pattern => {
                        let source = match test.anchor {
                            Anchor::None => pattern.to_string(),
                            Anchor::Start => format!("'^(?:' + {pattern} + ')'"),
                            Anchor::End => format!("'(?:' + {pattern} + ')$'"),
                        };
                        write!(f, "RegExp({source}, '{flags}').test({})", test.subject)
                    }
                }
            }
            Self::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f)
            }
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Iterate {
                mode,
                over,
                binder,
                body,
            } => write!(f, "{over}.{}({binder} => {body})", mode.method()),
        }
    }
}

fn try_rewrite_all<E>(
    items: Vec<Expr>,
    f: &mut impl FnMut(Expr) -> Result<Expr, E>,
) -> Result<Vec<Expr>, E> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item.try_rewrite(f)?);
    }

    Ok(out)
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}
