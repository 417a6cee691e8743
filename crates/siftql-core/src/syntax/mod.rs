//! Module: syntax
//! Responsibility: the grammar registry. Lexeme patterns, synonym rewrites,
//! template rules and the function table, plus compilation of templates
//! into case-insensitive matchers ordered longest-template-first.
//! Does not own: applying rules to a query (see `compile`).

mod builtin;
mod function;


pub use function::{FunctionTable, QueryFunction, today};

use crate::{
    compile::Settings,
    error::QueryError,
    expr::{Expr, PatternTest},
    guard,
    value::TextMode,
};
use indexmap::IndexMap;
use regex::Regex;
use std::{fmt, sync::Arc};

/// Rewrites one matched lexeme into an expression.
pub type LexemeGuard = Arc<dyn Fn(&str) -> Expr + Send + Sync>;

/// Rewrites a whole rule fragment, given every matched lexeme.
pub type FragmentGuard = Arc<dyn Fn(Expr, &LexemeValues) -> Expr + Send + Sync>;

/// Lexeme name → matched text, in template order.
pub type LexemeValues = IndexMap<String, String>;

///
/// SynonymRule
///
/// Regex rewrite applied to the filter clause before grammar matching.
/// The replacement may reference groups as `${1}` and is padded with
/// single spaces. When the pattern has a group named `op`, only that
/// group is replaced and the rest of the match is kept.
///

#[derive(Clone, Debug)]
pub struct SynonymRule {
    pattern: Regex,
    replacement: String,
}

impl SynonymRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, QueryError> {
        let pattern = Regex::new(pattern)
            .map_err(|err| QueryError::syntax(format!("synonym `{pattern}`: {err}")))?;

        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let mut expanded = String::new();
                caps.expand(&self.replacement, &mut expanded);
                let padded = format!(" {expanded} ");

                let whole = &caps[0];
                match caps.name("op") {
                    Some(op) => {
                        let start = op.start() - caps.get(0).map_or(0, |m| m.start());
                        let end = start + op.len();
                        format!("{}{padded}{}", &whole[..start], &whole[end..])
                    }
                    None => padded,
                }
            })
            .into_owned()
    }
}

///
/// GrammarRule
///
/// Template fragment with `Expr::Lexeme` placeholders, per-lexeme guards,
/// an optional fragment guard, and descriptive metadata.
///

#[derive(Clone)]
pub struct GrammarRule {
    pub fragment: Expr,
    pub guards: IndexMap<String, LexemeGuard>,
    pub fragment_guard: Option<FragmentGuard>,
    pub initial: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub examples: Vec<String>,
}

impl GrammarRule {
    #[must_use]
    pub fn new(fragment: Expr) -> Self {
        Self {
            fragment,
            guards: IndexMap::new(),
            fragment_guard: None,
            initial: None,
            title: None,
            description: None,
            examples: Vec::new(),
        }
    }

    #[must_use]
    pub fn guard<F>(mut self, lexeme: impl Into<String>, guard: F) -> Self
    where
        F: Fn(&str) -> Expr + Send + Sync + 'static,
    {
        self.guards.insert(lexeme.into(), Arc::new(guard));
        self
    }

    #[must_use]
    pub fn with_fragment_guard(mut self, guard: FragmentGuard) -> Self {
        self.fragment_guard = Some(guard);
        self
    }

    #[must_use]
    pub fn with_initial(mut self, initial: impl Into<String>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Build the expression for one match: fragment guard first, then every
    /// lexeme guarded and substituted. Unguarded lexemes fall back to
    /// [`guard::raw`].
    #[must_use]
    pub fn expand(&self, values: &LexemeValues) -> Expr {
        let fragment = match &self.fragment_guard {
            Some(fragment_guard) => fragment_guard(self.fragment.clone(), values),
            None => self.fragment.clone(),
        };

        fragment.substitute(&|name| {
            let text = values.get(name)?;
            Some(match self.guards.get(name) {
                Some(lexeme_guard) => lexeme_guard(text),
                None => guard::raw(text),
            })
        })
    }
}

impl fmt::Debug for GrammarRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarRule")
            .field("fragment", &self.fragment.to_string())
            .field("guards", &self.guards.keys().collect::<Vec<_>>())
            .field("fragment_guard", &self.fragment_guard.is_some())
            .field("initial", &self.initial)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("examples", &self.examples)
            .finish()
    }
}

///
/// CompiledGrammar
///

#[derive(Clone, Debug)]
pub struct CompiledGrammar {
    template: String,
    matcher: Regex,
    rule: GrammarRule,
}

impl CompiledGrammar {
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub const fn matcher(&self) -> &Regex {
        &self.matcher
    }

    #[must_use]
    pub const fn rule(&self) -> &GrammarRule {
        &self.rule
    }

    /// Lexeme values of the first match in `text`.
    #[must_use]
    pub fn match_values(&self, text: &str) -> Option<LexemeValues> {
        self.matcher
            .captures(text)
            .map(|caps| self.values(&caps))
    }

    pub(crate) fn values(&self, caps: &regex::Captures<'_>) -> LexemeValues {
        self.matcher
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect()
    }
}

///
/// SyntaxExtension
///
/// Additions merged over the built-in registry. Entries replace built-ins
/// with the same name; synonyms are appended after the built-ins.
///

#[derive(Clone, Debug, Default)]
pub struct SyntaxExtension {
    pub lexemes: IndexMap<String, String>,
    pub synonyms: Vec<SynonymRule>,
    pub grammars: IndexMap<String, GrammarRule>,
    pub functions: FunctionTable,
}

impl SyntaxExtension {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lexeme pattern; it must capture its text in a group named `name`.
    #[must_use]
    pub fn lexeme(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.lexemes.insert(name.into(), pattern.into());
        self
    }

    #[must_use]
    pub fn synonym(mut self, rule: SynonymRule) -> Self {
        self.synonyms.push(rule);
        self
    }

    #[must_use]
    pub fn grammar(mut self, template: impl Into<String>, rule: GrammarRule) -> Self {
        self.grammars.insert(template.into(), rule);
        self
    }

    #[must_use]
    pub fn function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, crate::error::FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(name, function);
        self
    }
}

///
/// Syntax
///

#[derive(Clone, Debug)]
pub struct Syntax {
    lexemes: IndexMap<String, String>,
    synonyms: Vec<SynonymRule>,
    grammars: IndexMap<String, GrammarRule>,
    functions: FunctionTable,
    compiled: Vec<CompiledGrammar>,
}

impl Syntax {
    pub fn new(settings: &Settings, extension: Option<SyntaxExtension>) -> Result<Self, QueryError> {
        let mut syntax = Self {
            lexemes: builtin::lexemes(),
            synonyms: builtin::synonyms()?,
            grammars: builtin::grammars(),
            functions: FunctionTable::builtin(),
            compiled: Vec::new(),
        };

        if let Some(extension) = extension {
            syntax.lexemes.extend(extension.lexemes);
            syntax.synonyms.extend(extension.synonyms);
            syntax.grammars.extend(extension.grammars);
            syntax.functions.extend(&extension.functions);
        }

        syntax.compile_grammars(settings)?;

        Ok(syntax)
    }

    /// Rebuild the matcher list for `settings`. Source rules are left
    /// untouched, so recompiling is idempotent.
    pub fn compile_grammars(&mut self, settings: &Settings) -> Result<(), QueryError> {
        let mut entries: Vec<(&String, &GrammarRule)> = self.grammars.iter().collect();
        entries.sort_by_key(|(template, _)| std::cmp::Reverse(template.chars().count()));

        let mut compiled = Vec::with_capacity(entries.len());
        for (template, rule) in entries {
            let mut rule = rule.clone();
            rule.fragment = compile_fragment(rule.fragment, settings);
            if !rule.guards.contains_key("key") {
                let key_guard: LexemeGuard = Arc::new(guard::common_guard);
                rule.guards.insert("key".to_string(), key_guard);
            }
            rule.initial.get_or_insert_with(|| template.clone());

            compiled.push(CompiledGrammar {
                template: template.clone(),
                matcher: self.compile_template(template)?,
                rule,
            });
        }
        self.compiled = compiled;

        Ok(())
    }

    /// Apply every synonym rule in declaration order.
    #[must_use]
    pub fn replace_synonyms(&self, text: &str) -> String {
        self.synonyms
            .iter()
            .fold(text.to_string(), |text, rule| rule.apply(&text))
    }

    #[must_use]
    pub const fn lexemes(&self) -> &IndexMap<String, String> {
        &self.lexemes
    }

    #[must_use]
    pub fn synonyms(&self) -> &[SynonymRule] {
        &self.synonyms
    }

    #[must_use]
    pub const fn grammars(&self) -> &IndexMap<String, GrammarRule> {
        &self.grammars
    }

    #[must_use]
    pub const fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Compiled rules in matching priority order.
    #[must_use]
    pub fn compiled(&self) -> &[CompiledGrammar] {
        &self.compiled
    }

    // Whole-word lexeme names become their patterns; other words are
    // escaped. Words are separated by whitespace runs.
    fn compile_template(&self, template: &str) -> Result<Regex, QueryError> {
        let words: Vec<&str> = template.split_whitespace().collect();
        let last = words.len().saturating_sub(1);

        let mut source = String::from("(?i)");
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                source.push_str(r"\s+");
            }
            if let Some(pattern) = self.lexemes.get(*word) {
                source.push_str(pattern);
                continue;
            }

            if i == 0 && word.starts_with(is_word_char) {
                source.push_str(r"\b");
            }
            source.push_str(&regex::escape(word));
            if i == last && word.ends_with(is_word_char) {
                source.push_str(r"\b");
            }
        }

        Regex::new(&source).map_err(|err| QueryError::syntax(format!("grammar `{template}`: {err}")))
    }
}

/// Apply case and equality settings to a rule fragment.
fn compile_fragment(fragment: Expr, settings: &Settings) -> Expr {
    let mode = if settings.case_sensitive {
        TextMode::Cs
    } else {
        TextMode::Ci
    };

    fragment.rewrite(&mut |node| match node {
        Expr::Pattern(test) => Expr::Pattern(PatternTest { mode, ..test }),
        Expr::Compare { op, left, right } if settings.strict_equality => Expr::Compare {
            op: op.strict(),
            left,
            right,
        },
        other => other,
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
