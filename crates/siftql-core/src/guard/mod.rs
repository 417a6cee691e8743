//! Module: guard
//! Responsibility: stateless rewrites from matched lexeme text to expression
//! fragments that cannot fail on missing or malformed record data.
//! Does not own: lexeme recognition or vault allocation.

#[cfg(test)]
mod tests;

use crate::{
    expr::{Expr, Literal},
    syntax::{FragmentGuard, LexemeValues},
    value::parse_number_literal,
    vault::{KEY_END, KEY_PREFIX, UNQUOTED_MARK, VaultKey, strip_quotes},
};
use regex::Regex;
use std::sync::{Arc, LazyLock};

static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("list separator pattern is valid"));

/// True for keywords, numbers, vault keys and quoted text: tokens that are
/// already safe to evaluate as-is.
#[must_use]
pub fn is_safe(text: &str) -> bool {
    matches!(text, "null" | "true" | "false" | "undefined")
        || parse_number_literal(text).is_some()
        || VaultKey::parse(text).is_some()
        || is_quoted(text)
}

/// Literal form of a safe token; `None` for anything that needs a guard.
#[must_use]
pub fn literal(text: &str) -> Option<Expr> {
    let expr = match text {
        "null" => Expr::null(),
        "true" => Expr::boolean(true),
        "false" => Expr::boolean(false),
        "undefined" => Expr::Literal(Literal::Undefined),
        _ => {
            if let Some(key) = VaultKey::parse(text) {
                Expr::Protected(key)
            } else if is_quoted(text) {
                Expr::text(strip_quotes(text))
            } else {
                Expr::number(parse_number_literal(text)?)
            }
        }
    };

    Some(expr)
}

/// Text literal, unless the token is already safe.
#[must_use]
pub fn quote(text: &str) -> Expr {
    literal(text).unwrap_or_else(|| Expr::text(text))
}

/// Like [`quote`], but vault keys point at their unquoted companion so the
/// literal contributes its inner text (used for pattern sources).
#[must_use]
pub fn unquote(text: &str) -> Expr {
    match VaultKey::parse(text) {
        Some(key) => Expr::Protected(key.unquoted()),
        None => quote(text),
    }
}

/// Value of the access chain when defined, otherwise the raw text itself.
#[must_use]
pub fn safe_variable(text: &str) -> Expr {
    let text = text.trim();
    literal(text).unwrap_or_else(|| Expr::Defaulted {
        value: Box::new(chain(text)),
        text: text.to_string(),
    })
}

/// Head defaulted to its own name, tail as optional member lookups.
#[must_use]
pub fn common_guard(text: &str) -> Expr {
    if let Some(expr) = literal(text) {
        return expr;
    }

    let parts = split_chain(text);
    let Some((head, tail)) = parts.split_first() else {
        return Expr::text(text);
    };
    let head = Expr::Defaulted {
        value: Box::new(Expr::ident(head.as_str())),
        text: head.clone(),
    };

    Expr::member(head, tail.to_vec())
}

/// Access chain whose head is a known scope identifier.
#[must_use]
pub fn headless_common_guard(text: &str) -> Expr {
    chain(text)
}

/// The head identifier when it holds an array, otherwise an empty array.
#[must_use]
pub fn safe_array_name(text: &str) -> Expr {
    let parts = split_chain(text);
    let head = parts.first().map_or(text, String::as_str);

    Expr::ArrayOr(Box::new(Expr::ident(head)))
}

/// Comma-separated items, each guarded with [`common_guard`].
#[must_use]
pub fn safe_list(text: &str) -> Expr {
    let items = LIST_SEPARATOR
        .split(text.trim())
        .filter(|item| !item.is_empty())
        .map(common_guard)
        .collect();

    Expr::List(items)
}

/// Fallback for lexemes without a guard: a literal when safe, otherwise an
/// unguarded access chain.
#[must_use]
pub fn raw(text: &str) -> Expr {
    literal(text).unwrap_or_else(|| chain(text))
}

/// Fragment guard pointing every `binder` reference at the tail of the
/// chain matched by `lexeme`. `items.name has 3` iterates `items` and
/// compares `item.name`.
#[must_use]
pub fn tie_lexeme(lexeme: &str, binder: &str) -> FragmentGuard {
    let lexeme = lexeme.to_string();
    let binder = binder.to_string();

    Arc::new(move |fragment: Expr, values: &LexemeValues| {
        let Some(matched) = values.get(&lexeme) else {
            return fragment;
        };
        let tail: Vec<String> = split_chain(matched).into_iter().skip(1).collect();
        if tail.is_empty() {
            return fragment;
        }

        fragment.rewrite(&mut |node| match node {
            Expr::Local(name) if name == binder => Expr::member(Expr::Local(name), tail.clone()),
            other => other,
        })
    })
}

/// Split an access chain into segments: `a.b[0]["c"]` → `a`, `b`, `0`, `c`.
#[must_use]
pub fn split_chain(text: &str) -> Vec<String> {
    text.split(|c: char| !is_chain_char(c))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render segments as an optional-chained access: `a?.['b']?.['c']`.
/// `paren_head` wraps a head that would otherwise bind too loosely.
#[must_use]
pub fn join_chain(parts: &[&str], paren_head: bool) -> String {
    let Some((head, tail)) = parts.split_first() else {
        return String::new();
    };

    let mut out = if paren_head {
        format!("({head})")
    } else {
        (*head).to_string()
    };
    for segment in tail {
        out.push_str("?.['");
        out.push_str(&segment.replace('\'', "\\'"));
        out.push_str("']");
    }

    out
}

fn chain(text: &str) -> Expr {
    let parts = split_chain(text);
    match parts.split_first() {
        Some((head, tail)) => Expr::member(Expr::ident(head.as_str()), tail.to_vec()),
        None => Expr::text(text),
    }
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2 && strip_quotes(text).len() + 2 == text.len()
}

fn is_chain_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | KEY_PREFIX | UNQUOTED_MARK | KEY_END)
}
