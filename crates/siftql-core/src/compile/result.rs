use crate::{compile::OrderClause, error::QueryError, predicate::FilterPredicate};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Sorts records in place. Reserved; the compiler never produces one.
pub type Sorter = Box<dyn Fn(&mut [JsonValue]) + Send + Sync>;

/// Filters and sorts a record set in one call. Reserved.
pub type QueryRunner = Box<dyn Fn(&[JsonValue]) -> Vec<JsonValue> + Send + Sync>;

///
/// UnderCursor
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UnderCursor {
    pub grammar: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub list: Option<String>,
}

///
/// QueryPart
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct QueryPart {
    pub text: Option<String>,
    pub position: Option<usize>,
    pub kind: Option<String>,
}

///
/// SuggestionMeta
///
/// Shape of the suggestion data a completion UI would consume. Always
/// returned unpopulated: nothing under the cursor, one empty part.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SuggestionMeta {
    pub under_cursor: UnderCursor,
    pub parts: Vec<QueryPart>,
}

impl Default for SuggestionMeta {
    fn default() -> Self {
        Self {
            under_cursor: UnderCursor::default(),
            parts: vec![QueryPart::default()],
        }
    }
}

///
/// CompileResult
///

pub struct CompileResult {
    pub predicate: FilterPredicate,
    pub error: Option<QueryError>,
    pub sorter: Option<Sorter>,
    pub query: Option<QueryRunner>,
    pub order: Option<OrderClause>,
    pub meta: SuggestionMeta,
}

impl fmt::Debug for CompileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileResult")
            .field("predicate", &self.predicate)
            .field("error", &self.error)
            .field("sorter", &self.sorter.is_some())
            .field("query", &self.query.is_some())
            .field("order", &self.order)
            .field("meta", &self.meta)
            .finish()
    }
}

///
/// ShortResult
///

#[derive(Debug)]
pub struct ShortResult {
    pub predicate: FilterPredicate,
    pub error: Option<QueryError>,
}

///
/// Transpiled
///

#[derive(Debug)]
pub enum Transpiled {
    Full(CompileResult),
    Short(ShortResult),
}

impl Transpiled {
    #[must_use]
    pub const fn predicate(&self) -> &FilterPredicate {
        match self {
            Self::Full(result) => &result.predicate,
            Self::Short(result) => &result.predicate,
        }
    }

    #[must_use]
    pub fn into_predicate(self) -> FilterPredicate {
        match self {
            Self::Full(result) => result.predicate,
            Self::Short(result) => result.predicate,
        }
    }

    #[must_use]
    pub const fn order(&self) -> Option<&OrderClause> {
        match self {
            Self::Full(result) => result.order.as_ref(),
            Self::Short(_) => None,
        }
    }

    #[must_use]
    pub const fn is_short(&self) -> bool {
        matches!(self, Self::Short(_))
    }
}
