//! Module: vault
//! Responsibility: protect literals and generated fragments from being
//! re-interpreted while the compiler rewrites query text.
//! Does not own: deciding what to protect (see `compile`).
//! Boundary: keys are spliced into text as opaque tokens and come back as
//! `Expr::Protected` handles that `resolve` replaces structurally.


use crate::expr::Expr;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::{fmt, sync::LazyLock};
use tracing::warn;

/// First code point of every vault key. Private-use, never accepted in input.
pub const KEY_PREFIX: char = '\u{E000}';

/// Trailing marker of an unquoted companion key.
pub const UNQUOTED_MARK: char = '\u{E001}';

/// Trailing marker of a plain key. Keeps user digits that follow a key out
/// of its index.
pub const KEY_END: char = '\u{E002}';

/// Restoration passes before giving up on nested keys.
pub const MAX_RESTORE_DEPTH: usize = 42;

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}([0-9]+)([\u{E001}\u{E002}])").expect("vault key pattern is valid")
});

///
/// VaultKey
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VaultKey {
    index: usize,
    unquoted: bool,
}

impl VaultKey {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            unquoted: false,
        }
    }

    /// The companion key holding the unquoted form of the same entry.
    #[must_use]
    pub const fn unquoted(self) -> Self {
        Self {
            index: self.index,
            unquoted: true,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn is_unquoted(self) -> bool {
        self.unquoted
    }

    /// Parse text consisting of exactly one key.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let caps = KEY_PATTERN.captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return None;
        }

        Self::from_captures(&caps)
    }

    fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        let index = caps.get(1)?.as_str().parse().ok()?;
        let key = Self::new(index);

        Some(if caps[2].starts_with(UNQUOTED_MARK) {
            key.unquoted()
        } else {
            key
        })
    }
}

impl fmt::Display for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.unquoted { UNQUOTED_MARK } else { KEY_END };

        write!(f, "{KEY_PREFIX}{}{mark}", self.index)
    }
}

///
/// Protected
///

#[derive(Clone, Debug, PartialEq)]
pub enum Protected {
    Text(String),
    Fragment(Expr),
}

impl Protected {
    /// Text spliced back by `Vault::restore`.
    #[must_use]
    pub fn source(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Fragment(expr) => expr.to_string(),
        }
    }
}

///
/// Vault
///

#[derive(Clone, Debug, Default)]
pub struct Vault {
    entries: IndexMap<VaultKey, Protected>,
}

impl Vault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: VaultKey) -> Option<&Protected> {
        self.entries.get(&key)
    }

    /// True when `text` is exactly one vault key, plain or companion.
    #[must_use]
    pub fn is_key(text: &str) -> bool {
        VaultKey::parse(text).is_some()
    }

    /// True when `text` contains a reserved key code point anywhere.
    #[must_use]
    pub fn contains_reserved(text: &str) -> bool {
        text.contains([KEY_PREFIX, UNQUOTED_MARK, KEY_END])
    }

    /// Store `value`, and its unquoted companion first when given.
    pub fn save(&mut self, value: impl Into<String>, unquoted: Option<String>) -> VaultKey {
        let key = self.next_key();
        if let Some(inner) = unquoted {
            self.entries.insert(key.unquoted(), Protected::Text(inner));
        }
        self.entries.insert(key, Protected::Text(value.into()));

        key
    }

    pub fn save_fragment(&mut self, expr: Expr) -> VaultKey {
        let key = self.next_key();
        self.entries.insert(key, Protected::Fragment(expr));

        key
    }

    /// Replace every quoted run with a vault key. A quote opens a run that
    /// ends at the next identical quote at least one character later; quotes
    /// left without a partner stay in the output.
    pub fn extract_quoted(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find(['\'', '"']) {
            let quote = &rest[open..=open];
            let after_open = &rest[open + 1..];

            // skip one inner character before looking for the close
            let Some(first) = after_open.chars().next() else {
                break;
            };
            let inner_start = first.len_utf8();
            let Some(close) = after_open[inner_start..].find(quote) else {
                out.push_str(&rest[..=open]);
                rest = after_open;
                continue;
            };

            let inner_end = inner_start + close;
            let inner = &after_open[..inner_end];
            let full = &rest[open..open + 1 + inner_end + 1];

            out.push_str(&rest[..open]);
            let key = self.save(full, Some(inner.to_string()));
            out.push_str(&key.to_string());
            rest = &after_open[inner_end + 1..];
        }

        out.push_str(rest);
        out
    }

    /// Splice stored text back until no key remains or the depth bound is hit.
    #[must_use]
    pub fn restore(&self, text: &str) -> String {
        let mut text = text.to_string();

        for _ in 0..MAX_RESTORE_DEPTH {
            if !KEY_PATTERN.is_match(&text) {
                return text;
            }
            text = KEY_PATTERN
                .replace_all(&text, |caps: &Captures<'_>| {
                    VaultKey::from_captures(caps)
                        .and_then(|key| self.entries.get(&key))
                        .map_or_else(|| caps[0].to_string(), Protected::source)
                })
                .into_owned();
        }

        if KEY_PATTERN.is_match(&text) {
            warn!(depth = MAX_RESTORE_DEPTH, "vault restore depth exhausted");
        }

        text
    }

    /// Replace `Protected` handles and key path segments with stored content.
    #[must_use]
    pub fn resolve(&self, expr: Expr) -> Expr {
        self.resolve_at(expr, MAX_RESTORE_DEPTH)
    }

    fn resolve_at(&self, expr: Expr, depth: usize) -> Expr {
        expr.rewrite(&mut |node| match node {
            Expr::Protected(key) => self.expand(key, depth),
            Expr::Member { object, path } => Expr::Member {
                object,
                path: path
                    .into_iter()
                    .map(|segment| self.resolve_segment(segment))
                    .collect(),
            },
            other => other,
        })
    }

    fn expand(&self, key: VaultKey, depth: usize) -> Expr {
        if depth == 0 {
            warn!(%key, "vault resolve depth exhausted");
            return Expr::Protected(key);
        }

        match self.entries.get(&key) {
            Some(Protected::Text(text)) if key.is_unquoted() => Expr::text(text.clone()),
            Some(Protected::Text(text)) => Expr::text(strip_quotes(text)),
            Some(Protected::Fragment(fragment)) => self.resolve_at(fragment.clone(), depth - 1),
            None => Expr::Protected(key),
        }
    }

    // quoted field names in access chains resolve to their inner text
    fn resolve_segment(&self, segment: String) -> String {
        let Some(key) = VaultKey::parse(&segment) else {
            return segment;
        };

        match self.entries.get(&key.unquoted()) {
            Some(Protected::Text(inner)) => inner.clone(),
            _ => match self.entries.get(&key) {
                Some(Protected::Text(text)) => strip_quotes(text).to_string(),
                _ => segment,
            },
        }
    }

    fn next_key(&self) -> VaultKey {
        VaultKey::new(self.entries.len() + 1)
    }
}

/// Drop one pair of matching outer quotes, if present.
#[must_use]
pub fn strip_quotes(text: &str) -> &str {
    let bytes = text.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(&open @ (b'\'' | b'"')), Some(&close)) if text.len() >= 2 && open == close => {
            &text[1..text.len() - 1]
        }
        _ => text,
    }
}
