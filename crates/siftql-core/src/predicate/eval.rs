use crate::{
    error::QueryError,
    expr::{CompareOp, CompiledPattern, Expr, IterMode, Literal, LogicalOp, PatternTest},
    syntax::FunctionTable,
    value::{Operand, compare_order, loose_eq, same_value_zero, strict_eq},
};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

///
/// FieldPresence
///
/// Result of reading one name from the evaluation scope. Distinguishes an
/// unbound name from a bound name whose value is `null`.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FieldPresence<'r> {
    Present(&'r JsonValue),
    Missing,
}

///
/// Scope
///
/// Names visible to an expression besides its own iteration binders.
///

pub(crate) trait Scope<'r> {
    fn field(&self, name: &str) -> FieldPresence<'r>;

    fn slot(&self, index: usize) -> FieldPresence<'r>;
}

///
/// RecordScope
///
/// Generic mode: every top-level record field, then the argument root.
///

pub(crate) struct RecordScope<'r> {
    pub(crate) record: &'r Map<String, JsonValue>,
    pub(crate) root_name: &'r str,
    pub(crate) root: &'r JsonValue,
}

impl<'r> Scope<'r> for RecordScope<'r> {
    fn field(&self, name: &str) -> FieldPresence<'r> {
        match self.record.get(name) {
            Some(value) => FieldPresence::Present(value),
            None if name == self.root_name => FieldPresence::Present(self.root),
            None => FieldPresence::Missing,
        }
    }

    fn slot(&self, _index: usize) -> FieldPresence<'r> {
        FieldPresence::Missing
    }
}

///
/// SlotScope
///
/// Shape mode: fields were bound to slots when the plan was built, so only
/// the argument root remains visible by name.
///

pub(crate) struct SlotScope<'r> {
    pub(crate) slots: Vec<Option<&'r JsonValue>>,
    pub(crate) root_name: &'r str,
    pub(crate) root: &'r JsonValue,
}

impl<'r> Scope<'r> for SlotScope<'r> {
    fn field(&self, name: &str) -> FieldPresence<'r> {
        if name == self.root_name {
            FieldPresence::Present(self.root)
        } else {
            FieldPresence::Missing
        }
    }

    fn slot(&self, index: usize) -> FieldPresence<'r> {
        match self.slots.get(index).copied().flatten() {
            Some(value) => FieldPresence::Present(value),
            None => FieldPresence::Missing,
        }
    }
}

///
/// Evaluator
///
/// Tree-walking interpreter shared by both predicate modes.
///

pub(crate) struct Evaluator<'a, S> {
    scope: &'a S,
    functions: &'a FunctionTable,
    locals: Vec<(&'a str, Operand<'a>)>,
}

impl<'a, S: Scope<'a>> Evaluator<'a, S> {
    pub(crate) const fn new(scope: &'a S, functions: &'a FunctionTable) -> Self {
        Self {
            scope,
            functions,
            locals: Vec::new(),
        }
    }

    pub(crate) fn eval(&mut self, expr: &'a Expr) -> Result<Operand<'a>, QueryError> {
        match expr {
            Expr::Literal(literal) => Ok(literal_operand(literal)),
            Expr::Protected(_) => Ok(Operand::Undefined),
            Expr::Lexeme(name) => Err(QueryError::runtime(format!(
                "unresolved lexeme `{name}`"
            ))),
            Expr::Ident(name) => match self.scope.field(name) {
                FieldPresence::Present(value) => Ok(Operand::Borrowed(value)),
                FieldPresence::Missing => Err(not_defined(name)),
            },
            Expr::Local(name) => self.local(name),
            Expr::Slot { index, .. } => Ok(presence_operand(self.scope.slot(*index))),
            Expr::Root(name) => Ok(presence_operand(self.scope.field(name))),
            Expr::Member { object, path } => {
                let object = self.eval(object)?;
                Ok(walk_path(object, path))
            }
            Expr::Defaulted { value, text } => {
                let value = self.eval_lenient(value)?;
                Ok(if value.is_undefined() {
                    Operand::text(text.as_str())
                } else {
                    value
                })
            }
            Expr::ArrayOr(inner) => {
                let value = self.eval_lenient(inner)?;
                Ok(if value.is_array() {
                    value
                } else {
                    Operand::List(Vec::new())
                })
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Operand::List(values))
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(Operand::bool(compare(*op, &left, &right)))
            }
            Expr::Includes { list, needle } => {
                let list = self.eval(list)?;
                let needle = self.eval(needle)?;
                let elements = list
                    .elements()
                    .ok_or_else(|| QueryError::runtime("membership target is not an array"))?;

                Ok(Operand::bool(
                    elements.iter().any(|element| same_value_zero(element, &needle)),
                ))
            }
            Expr::Pattern(test) => self.eval_pattern(test),
            Expr::Not(inner) => Ok(Operand::bool(!self.eval(inner)?.truthy())),
            Expr::Logical { op, operands } => self.eval_logical(*op, operands),
            Expr::Call { name, args } => self.eval_call(name, args),
            Expr::Iterate {
                mode,
                over,
                binder,
                body,
            } => self.eval_iterate(*mode, over, binder, body),
        }
    }

    // Yields the first operand that decides the chain, else the last one.
    fn eval_logical(&mut self, op: LogicalOp, operands: &'a [Expr]) -> Result<Operand<'a>, QueryError> {
        let mut value = Operand::Undefined;
        for operand in operands {
            value = self.eval(operand)?;
            let decided = match op {
                LogicalOp::And => !value.truthy(),
                LogicalOp::Or => value.truthy(),
            };
            if decided {
                break;
            }
        }

        Ok(value)
    }

    // Unbound heads read as undefined instead of failing.
    fn eval_lenient(&mut self, expr: &'a Expr) -> Result<Operand<'a>, QueryError> {
        match expr {
            Expr::Ident(name) => Ok(presence_operand(self.scope.field(name))),
            Expr::Member { object, path } => {
                let object = self.eval_lenient(object)?;
                Ok(walk_path(object, path))
            }
            other => self.eval(other),
        }
    }

    fn local(&self, name: &str) -> Result<Operand<'a>, QueryError> {
        self.locals
            .iter()
            .rev()
            .find(|(binder, _)| *binder == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| not_defined(name))
    }

    fn eval_pattern(&mut self, test: &'a PatternTest) -> Result<Operand<'a>, QueryError> {
        let subject = self.eval(&test.subject)?.to_text();
        if let Some(compiled) = &test.compiled {
            return Ok(Operand::bool(compiled.is_match(&subject)));
        }

        let source = self.eval(&test.pattern)?.to_text();
        let compiled = CompiledPattern::new(&source, test.anchor, test.mode)
            .map_err(|err| QueryError::runtime(format!("invalid pattern `{source}`: {err}")))?;

        Ok(Operand::bool(compiled.is_match(&subject)))
    }

    fn eval_call(&mut self, name: &str, args: &'a [Expr]) -> Result<Operand<'a>, QueryError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?.into_json());
        }

        match self.functions.call(name, &values) {
            Some(Ok(result)) => Ok(Operand::Owned(result)),
            Some(Err(err)) => Err(QueryError::runtime(format!("`{name}` failed: {err}"))),
            None => Err(QueryError::runtime(format!("`{name}` is not a function"))),
        }
    }

    fn eval_iterate(
        &mut self,
        mode: IterMode,
        over: &'a Expr,
        binder: &'a str,
        body: &'a Expr,
    ) -> Result<Operand<'a>, QueryError> {
        let over = self.eval(over)?;
        let elements = over
            .elements()
            .ok_or_else(|| QueryError::runtime("iteration target is not an array"))?;

        let mut mapped = Vec::new();
        for element in elements {
            self.locals.push((binder, element));
            let outcome = self.eval(body);
            self.locals.pop();
            let outcome = outcome?;

            match mode {
                IterMode::Some if outcome.truthy() => return Ok(Operand::bool(true)),
                IterMode::Every if !outcome.truthy() => return Ok(Operand::bool(false)),
                IterMode::Map => mapped.push(outcome),
                IterMode::Some | IterMode::Every => {}
            }
        }

        Ok(match mode {
            IterMode::Some => Operand::bool(false),
            IterMode::Every => Operand::bool(true),
            IterMode::Map => Operand::List(mapped),
        })
    }
}

fn compare(op: CompareOp, left: &Operand<'_>, right: &Operand<'_>) -> bool {
    match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::StrictEq => strict_eq(left, right),
        CompareOp::StrictNe => !strict_eq(left, right),
        CompareOp::Lt => compare_order(left, right).is_some_and(Ordering::is_lt),
        CompareOp::Lte => compare_order(left, right).is_some_and(Ordering::is_le),
        CompareOp::Gt => compare_order(left, right).is_some_and(Ordering::is_gt),
        CompareOp::Gte => compare_order(left, right).is_some_and(Ordering::is_ge),
    }
}

pub(crate) fn walk_path<'a>(mut value: Operand<'a>, path: &[String]) -> Operand<'a> {
    for segment in path {
        if value.is_undefined() {
            break;
        }
        value = value.member(segment);
    }

    value
}

fn literal_operand(literal: &Literal) -> Operand<'static> {
    literal.to_json().map_or(Operand::Undefined, Operand::Owned)
}

const fn presence_operand(presence: FieldPresence<'_>) -> Operand<'_> {
    match presence {
        FieldPresence::Present(value) => Operand::Borrowed(value),
        FieldPresence::Missing => Operand::Undefined,
    }
}

fn not_defined(name: &str) -> QueryError {
    QueryError::runtime(format!("`{name}` is not defined"))
}
