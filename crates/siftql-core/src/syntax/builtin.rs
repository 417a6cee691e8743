use crate::{
    error::QueryError,
    expr::{Anchor, CompareOp, Expr, IterMode},
    guard,
    syntax::{GrammarRule, SynonymRule},
};
use indexmap::IndexMap;

pub(super) fn lexemes() -> IndexMap<String, String> {
    [
        // access chain: `a`, `a.b`, `a[0].b`
        ("key", r"(?P<key>[\p{Alphabetic}_$][\w$.]*(?:\[[^\]\s]*\][\w$.]*)*)"),
        // one value token; vault keys count as values
        ("value", r"(?P<value>[\w.$\x{E000}-\x{E002}-]+)"),
        ("list", r"\((?P<list>[^)]+)\)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name.to_string(), pattern.to_string()))
    .collect()
}

pub(super) fn synonyms() -> Result<Vec<SynonymRule>, QueryError> {
    Ok(vec![
        SynonymRule::new(r"(?i)\bAND\b", "&&")?,
        SynonymRule::new(r"(?i)\bOR\b", "||")?,
        SynonymRule::new(r"!~+", "not contains")?,
        SynonymRule::new(r"~+", "contains")?,
        SynonymRule::new(r"(?:^|[^!<>=])(?P<op>=+)", "==")?,
    ])
}

pub(super) fn grammars() -> IndexMap<String, GrammarRule> {
    let key = || Expr::lexeme("key");
    let value = || Expr::lexeme("value");
    let list = || Expr::lexeme("list");
    let item = || Expr::local("item");

    let pattern = |anchor| Expr::pattern(key(), value(), anchor);
    let pattern_rule = |anchor| GrammarRule::new(pattern(anchor)).guard("value", guard::unquote);
    let negated_pattern_rule =
        |anchor| GrammarRule::new(Expr::negate(pattern(anchor))).guard("value", guard::unquote);
    let compare_rule = |op, right| GrammarRule::new(Expr::compare(op, key(), right));

    let rules = [
        (
            "key in list",
            GrammarRule::new(Expr::includes(list(), key()))
                .guard("list", guard::safe_list)
                .with_description("Search for the key's value in a parenthesized list")
                .with_example("status in (open, pending)"),
        ),
        (
            "key not in list",
            GrammarRule::new(Expr::negate(Expr::includes(list(), key())))
                .guard("list", guard::safe_list),
        ),
        (
            "key has value",
            GrammarRule::new(Expr::iterate(
                IterMode::Some,
                key(),
                "item",
                Expr::compare(CompareOp::Eq, item(), value()),
            ))
            .guard("key", guard::safe_array_name)
            .guard("value", guard::safe_variable)
            .with_fragment_guard(guard::tie_lexeme("key", "item")),
        ),
        (
            "key has one of list",
            GrammarRule::new(Expr::iterate(
                IterMode::Some,
                key(),
                "item",
                Expr::includes(list(), item()),
            ))
            .guard("key", guard::safe_array_name)
            .guard("list", guard::safe_list)
            .with_fragment_guard(guard::tie_lexeme("key", "item")),
        ),
        (
            "key has all of list",
            GrammarRule::new(Expr::iterate(
                IterMode::Every,
                list(),
                "value",
                Expr::includes(
                    Expr::iterate(IterMode::Map, key(), "item", item()),
                    Expr::local("value"),
                ),
            ))
            .guard("key", guard::safe_array_name)
            .guard("list", guard::safe_list)
            .with_fragment_guard(guard::tie_lexeme("key", "item")),
        ),
        ("key like value", pattern_rule(Anchor::None)),
        ("key contains value", pattern_rule(Anchor::None)),
        ("key not like value", negated_pattern_rule(Anchor::None)),
        ("key not contains value", negated_pattern_rule(Anchor::None)),
        ("key is null", compare_rule(CompareOp::Eq, Expr::null())),
        ("key is not null", compare_rule(CompareOp::Ne, Expr::null())),
        ("key is empty", compare_rule(CompareOp::Eq, Expr::text(""))),
        ("key is not empty", compare_rule(CompareOp::Ne, Expr::text(""))),
        ("key starts with value", pattern_rule(Anchor::Start)),
        ("key not starts with value", negated_pattern_rule(Anchor::Start)),
        ("key ends with value", pattern_rule(Anchor::End)),
        ("key not ends with value", negated_pattern_rule(Anchor::End)),
    ];

    rules
        .into_iter()
        .map(|(template, rule)| (template.to_string(), rule))
        .collect()
}
