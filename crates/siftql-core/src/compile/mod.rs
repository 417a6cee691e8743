//! Module: compile
//! Responsibility: the query pipeline from raw text to a `FilterPredicate`.
//! Does not own: rule definitions (see `syntax`) or evaluation (see
//! `predicate`).
//! Boundary: every failure before the predicate exists is a typed
//! compile-time `QueryError`.

mod order;
mod result;
mod settings;

#[cfg(test)]
mod tests;

pub use order::{OrderClause, OrderDirection, OrderItem};
pub use result::{
    CompileResult, QueryPart, QueryRunner, ShortResult, Sorter, SuggestionMeta, Transpiled,
    UnderCursor,
};
pub use settings::{DEFAULT_NODE_NAME, Settings, TranspileOptions};

use crate::{
    error::QueryError,
    expr::parse_residual,
    guard,
    predicate::{FilterPredicate, PredicateMode},
    syntax::{Syntax, SyntaxExtension},
    vault::{KEY_END, KEY_PREFIX, UNQUOTED_MARK, Vault},
};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s+)order\s+by(?:\s+|$)").expect("order-by pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// Access chains left over after grammar substitution.
static FREE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Alphabetic}_$][\w$]*(?:\.[\w$]+|\[[^\]\s]*\])*").expect("free token pattern is valid")
});

///
/// Compiler
///
/// Owns one vault and one grammar registry. `transpile` needs `&mut self`,
/// so concurrent compiles use separate instances.
///

#[derive(Debug)]
pub struct Compiler {
    settings: Settings,
    syntax: Syntax,
    vault: Vault,
}

impl Compiler {
    pub fn new(settings: Settings, extension: Option<SyntaxExtension>) -> Result<Self, QueryError> {
        let syntax = Syntax::new(&settings, extension)?;

        Ok(Self {
            settings,
            syntax,
            vault: Vault::new(),
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub const fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    /// Vault contents left by the most recent compile.
    #[must_use]
    pub const fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Replace the settings and recompile the grammar rules for them.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), QueryError> {
        self.syntax.compile_grammars(&settings)?;
        self.settings = settings;

        Ok(())
    }

    /// Compile `query` into a predicate plus its parsed order clause.
    pub fn transpile(
        &mut self,
        query: &str,
        options: &TranspileOptions,
    ) -> Result<Transpiled, QueryError> {
        let strict_filter = options.strict_filter.unwrap_or(self.settings.strict_filter);
        let filter_only = options.filter_only.unwrap_or(self.settings.filter_only);
        let node_name = options
            .node_name
            .clone()
            .unwrap_or_else(|| self.settings.node_name.clone());
        let mode = if strict_filter {
            PredicateMode::ShapeCached
        } else {
            PredicateMode::Generic
        };

        if Vault::contains_reserved(query) {
            return Err(QueryError::syntax("query contains reserved characters"));
        }
        self.vault.reset();

        let text = self.vault.extract_quoted(query);
        if text.contains(['\'', '"']) {
            return Err(QueryError::Quotation);
        }

        let (filter, order) = split_clauses(&text)?;
        let order = order
            .map(|clause| OrderClause::parse(clause, &self.vault))
            .transpose()?;

        let predicate = self.compile_filter(filter, &node_name, mode)?;
        debug!(query, source = predicate.source(), ?mode, "query compiled");

        Ok(if filter_only {
            Transpiled::Short(ShortResult {
                predicate,
                error: None,
            })
        } else {
            Transpiled::Full(CompileResult {
                predicate,
                error: None,
                sorter: None,
                query: None,
                order,
                meta: SuggestionMeta::default(),
            })
        })
    }

    fn compile_filter(
        &mut self,
        filter: &str,
        node_name: &str,
        mode: PredicateMode,
    ) -> Result<FilterPredicate, QueryError> {
        let text = self.syntax.replace_synonyms(filter);
        let text = WHITESPACE.replace_all(&text, " ");
        let text = self.apply_grammars(text.trim());
        let text = self.guard_residual(&text);

        let expr = parse_residual(&text, self.settings.strict_equality).map_err(|err| match err {
            QueryError::Syntax(message) => {
                QueryError::Syntax(format!("{message} in `{}`", self.vault.restore(&text)))
            }
            other => other,
        })?;
        let expr = self.vault.resolve(expr);

        FilterPredicate::new(expr, node_name, self.syntax.functions().clone(), mode)
    }

    // One pass per rule, longest template first. Each match becomes a
    // vault key, so later rules cannot re-match generated code.
    fn apply_grammars(&mut self, text: &str) -> String {
        let Self { syntax, vault, .. } = self;

        let mut text = text.to_string();
        for grammar in syntax.compiled() {
            text = grammar
                .matcher()
                .replace_all(&text, |caps: &Captures<'_>| {
                    let values = grammar.values(caps);
                    let fragment = grammar.rule().expand(&values);

                    vault.save_fragment(fragment).to_string()
                })
                .into_owned();
        }

        text
    }

    // Guard every access chain that is not already a key, a safe literal,
    // part of a larger token, or a function name.
    fn guard_residual(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for token in FREE_TOKEN.find_iter(text) {
            let joined = text[..token.start()]
                .chars()
                .next_back()
                .is_some_and(is_token_char);
            let called = text[token.end()..].trim_start().starts_with('(');
            if joined || called || guard::is_safe(token.as_str()) {
                continue;
            }

            let key = self
                .vault
                .save_fragment(guard::common_guard(token.as_str()));
            out.push_str(&text[last..token.start()]);
            out.push_str(&key.to_string());
            last = token.end();
        }
        out.push_str(&text[last..]);

        out
    }
}

/// Split the text into its filter clause and optional order clause.
fn split_clauses(text: &str) -> Result<(&str, Option<&str>), QueryError> {
    let parts: Vec<&str> = ORDER_BY.split(text).map(str::trim).collect();
    let (filter, order) = match parts.as_slice() {
        [filter] => (*filter, None),
        [filter, order] => (*filter, Some(*order).filter(|order| !order.is_empty())),
        _ => return Err(QueryError::Ordering),
    };

    if filter.is_empty() && order.is_none() {
        return Err(QueryError::EmptyQuery);
    }

    Ok((filter, order))
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | KEY_PREFIX | UNQUOTED_MARK | KEY_END)
}
