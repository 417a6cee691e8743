use crate::error::FunctionError;
use derive_more::Deref;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::{fmt, sync::Arc};
use time::{OffsetDateTime, macros::format_description};

///
/// QueryFunction
///
/// Callable visible to queries by name. Arguments arrive evaluated;
/// undefined arguments are passed as `null`.
///

pub type QueryFunction =
    Arc<dyn Fn(&[JsonValue]) -> Result<JsonValue, FunctionError> + Send + Sync>;

///
/// FunctionTable
///

#[derive(Clone, Default, Deref)]
pub struct FunctionTable(IndexMap<String, QueryFunction>);

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the built-in functions.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.insert("today", |_args| today().map(JsonValue::String));

        table
    }

    /// Add or replace a function.
    pub fn insert<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[JsonValue]) -> Result<JsonValue, FunctionError> + Send + Sync + 'static,
    {
        self.0.insert(name.into(), Arc::new(function));
    }

    /// Merge `other` into this table; entries in `other` win.
    pub fn extend(&mut self, other: &Self) {
        for (name, function) in &other.0 {
            self.0.insert(name.clone(), Arc::clone(function));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub(crate) fn call(&self, name: &str, args: &[JsonValue]) -> Option<Result<JsonValue, FunctionError>> {
        self.0.get(name).map(|function| function(args))
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Local calendar date as `YYYY-MM-DD`; UTC when the offset is unknown.
pub fn today() -> Result<String, FunctionError> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());

    now.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| FunctionError::new(format!("date formatting failed: {err}")))
}
