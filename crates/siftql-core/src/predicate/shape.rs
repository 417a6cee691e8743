use crate::{error::QueryError, expr::Expr, predicate::prepare};
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};
use std::{collections::HashMap, sync::Arc};
use tracing::trace;
use xxhash_rust::xxh3::Xxh3;

///
/// ShapePlan
///
/// Expression with identifiers bound to slots of one record shape.
/// `fields` is the sorted field-name list the plan was built for.
///

#[derive(Debug)]
pub(crate) struct ShapePlan {
    fields: Vec<String>,
    expr: Expr,
}

impl ShapePlan {
    pub(crate) fn compile(expr: &Expr, fields: &[&str], root_name: &str) -> Result<Self, QueryError> {
        let bound = expr.clone().rewrite(&mut |node| match node {
            Expr::Ident(name) => match fields.binary_search(&name.as_str()) {
                Ok(index) => Expr::Slot { index, name },
                Err(_) if name == root_name => Expr::Root(name),
                Err(_) => Expr::Ident(name),
            },
            other => other,
        });

        Ok(Self {
            fields: fields.iter().map(|field| (*field).to_string()).collect(),
            expr: prepare(bound)?,
        })
    }

    pub(crate) const fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Field values in slot order.
    pub(crate) fn slots<'r>(&self, record: &'r Map<String, JsonValue>) -> Vec<Option<&'r JsonValue>> {
        self.fields.iter().map(|field| record.get(field)).collect()
    }

    fn is_for(&self, fields: &[&str]) -> bool {
        self.fields.len() == fields.len()
            && self.fields.iter().zip(fields).all(|(a, b)| a == b)
    }
}

///
/// ShapeCache
///
/// Plans keyed by record shape. Grows with every distinct field set seen
/// and is never evicted.
///

#[derive(Debug, Default)]
pub(crate) struct ShapeCache {
    plans: Mutex<HashMap<u64, Vec<Arc<ShapePlan>>>>,
}

impl ShapeCache {
    /// Cached plan for the record's shape, compiling it on first sight.
    pub(crate) fn plan(
        &self,
        record: &Map<String, JsonValue>,
        expr: &Expr,
        root_name: &str,
    ) -> Result<Arc<ShapePlan>, QueryError> {
        let mut fields: Vec<&str> = record.keys().map(String::as_str).collect();
        fields.sort_unstable();
        let fingerprint = shape_fingerprint(&fields);

        let mut plans = self.plans.lock();
        let bucket = plans.entry(fingerprint).or_default();
        if let Some(plan) = bucket.iter().find(|plan| plan.is_for(&fields)) {
            return Ok(Arc::clone(plan));
        }

        trace!(fingerprint, fields = fields.len(), "shape cache miss");
        let plan = Arc::new(ShapePlan::compile(expr, &fields, root_name)?);
        bucket.push(Arc::clone(&plan));

        Ok(plan)
    }

    /// Number of distinct shapes compiled so far.
    pub(crate) fn len(&self) -> usize {
        self.plans.lock().values().map(Vec::len).sum()
    }
}

// Names are separated by 0xFF, which never occurs in UTF-8.
fn shape_fingerprint(fields: &[&str]) -> u64 {
    let mut hasher = Xxh3::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update(&[0xFF]);
    }

    hasher.digest()
}
