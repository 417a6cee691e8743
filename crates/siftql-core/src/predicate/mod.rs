//! Module: predicate
//! Responsibility: turn a resolved expression into a callable record filter.
//! Does not own: query text handling or grammar matching.
//! Boundary: generic mode resolves names per call; shape-cached mode binds
//! names to field slots once per record shape.

mod eval;
mod shape;

#[cfg(test)]
mod tests;

use crate::{
    error::QueryError,
    expr::{CompiledPattern, Expr, Literal, PatternTest},
    guard::split_chain,
    syntax::FunctionTable,
    value::{Operand, format_number},
};
use eval::{Evaluator, RecordScope, SlotScope, walk_path};
use serde_json::{Map, Value as JsonValue};
use shape::ShapeCache;
use std::sync::Arc;

///
/// PredicateMode
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PredicateMode {
    /// Resolve every name against the record on each call.
    Generic,

    /// Bind names to field slots once per record shape and reuse the plan.
    ShapeCached,
}

///
/// NodePath
///
/// Access chain from the predicate argument to the record. The head names
/// the argument itself inside expressions.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodePath {
    head: String,
    tail: Vec<String>,
}

impl NodePath {
    pub fn parse(node_name: &str) -> Result<Self, QueryError> {
        let mut parts = split_chain(node_name).into_iter();
        let head = parts
            .next()
            .ok_or_else(|| QueryError::syntax(format!("invalid node name `{node_name}`")))?;

        Ok(Self {
            head,
            tail: parts.collect(),
        })
    }

    #[must_use]
    pub fn head(&self) -> &str {
        &self.head
    }

    #[must_use]
    pub fn tail(&self) -> &[String] {
        &self.tail
    }

    /// The record object reached from `argument`, tolerating missing links.
    #[must_use]
    pub fn resolve<'r>(&self, argument: &'r JsonValue) -> Option<&'r Map<String, JsonValue>> {
        walk_path(Operand::Borrowed(argument), &self.tail).as_record()
    }
}

///
/// FilterPredicate
///
/// Compiled record filter. `test` yields `None` when the argument does not
/// lead to a record, and otherwise the truthiness of the expression.
///

#[derive(Debug)]
pub struct FilterPredicate {
    expr: Arc<Expr>,
    source: String,
    node: NodePath,
    functions: FunctionTable,
    mode: PredicateMode,
    shapes: ShapeCache,
}

impl FilterPredicate {
    pub fn new(
        expr: Expr,
        node_name: &str,
        functions: FunctionTable,
        mode: PredicateMode,
    ) -> Result<Self, QueryError> {
        let node = NodePath::parse(node_name)?;
        let expr = prepare(expr)?;

        Ok(Self {
            source: expr.to_string(),
            expr: Arc::new(expr),
            node,
            functions,
            mode,
            shapes: ShapeCache::default(),
        })
    }

    /// Rendered expression, for debugging.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    #[must_use]
    pub const fn mode(&self) -> PredicateMode {
        self.mode
    }

    #[must_use]
    pub const fn node(&self) -> &NodePath {
        &self.node
    }

    /// Distinct record shapes compiled by the shape-cached backend.
    #[must_use]
    pub fn cached_shapes(&self) -> usize {
        self.shapes.len()
    }

    pub fn test(&self, argument: &JsonValue) -> Result<Option<bool>, QueryError> {
        let Some(record) = self.node.resolve(argument) else {
            return Ok(None);
        };

        let outcome = match self.mode {
            PredicateMode::Generic => {
                let scope = RecordScope {
                    record,
                    root_name: &self.node.head,
                    root: argument,
                };
                Evaluator::new(&scope, &self.functions)
                    .eval(&self.expr)?
                    .truthy()
            }
            PredicateMode::ShapeCached => {
                let plan = self.shapes.plan(record, &self.expr, &self.node.head)?;
                let scope = SlotScope {
                    slots: plan.slots(record),
                    root_name: &self.node.head,
                    root: argument,
                };
                Evaluator::new(&scope, &self.functions)
                    .eval(plan.expr())?
                    .truthy()
            }
        };

        Ok(Some(outcome))
    }

    /// `test` with an undefined outcome read as `false`.
    pub fn matches(&self, argument: &JsonValue) -> Result<bool, QueryError> {
        Ok(self.test(argument)? == Some(true))
    }

    /// Records whose outcome is `Some(true)`; stops at the first runtime error.
    pub fn filter<'r, I>(&self, records: I) -> Result<Vec<&'r JsonValue>, QueryError>
    where
        I: IntoIterator<Item = &'r JsonValue>,
    {
        let mut kept = Vec::new();
        for record in records {
            if self.matches(record)? {
                kept.push(record);
            }
        }

        Ok(kept)
    }
}

/// Validate an expression for evaluation and compile its literal patterns.
pub(crate) fn prepare(expr: Expr) -> Result<Expr, QueryError> {
    expr.try_rewrite(&mut |node| match node {
        Expr::Lexeme(name) => Err(QueryError::syntax(format!("unresolved lexeme `{name}`"))),
        Expr::Protected(key) => Err(QueryError::syntax(format!(
            "unresolved protected literal #{}",
            key.index()
        ))),
        Expr::Pattern(test) => compile_pattern(test).map(Expr::Pattern),
        other => Ok(other),
    })
}

fn compile_pattern(test: PatternTest) -> Result<PatternTest, QueryError> {
    if test.compiled.is_some() {
        return Ok(test);
    }
    let Expr::Literal(literal) = test.pattern.as_ref() else {
        return Ok(test);
    };

    let source = literal_source(literal);
    let compiled = CompiledPattern::new(&source, test.anchor, test.mode)
        .map_err(|err| QueryError::syntax(format!("invalid pattern `{source}`: {err}")))?;

    Ok(PatternTest {
        compiled: Some(compiled),
        ..test
    })
}

fn literal_source(literal: &Literal) -> String {
    match literal {
        Literal::Undefined => "undefined".to_string(),
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Number(n) => format_number(*n),
        Literal::Text(text) => text.clone(),
    }
}
