use serde::{Deserialize, Serialize};

/// Name the record argument is bound to when no other is configured.
pub const DEFAULT_NODE_NAME: &str = "node";

///
/// Settings
///
/// Compiler configuration. Every field has a default, so partial
/// configuration files deserialize.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Pattern tests match case-sensitively.
    pub case_sensitive: bool,

    /// `==` / `!=` compile to strict comparisons.
    pub strict_equality: bool,

    /// Use the shape-cached predicate backend.
    pub strict_filter: bool,

    /// Return only the predicate and error from `transpile`.
    pub filter_only: bool,

    /// Access chain from the predicate argument to the record.
    pub node_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            strict_equality: false,
            strict_filter: true,
            filter_only: false,
            node_name: DEFAULT_NODE_NAME.to_string(),
        }
    }
}

///
/// TranspileOptions
///
/// Per-call overrides of the compiler settings.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TranspileOptions {
    pub strict_filter: Option<bool>,
    pub node_name: Option<String>,
    pub filter_only: Option<bool>,

    /// Reserved for suggestion support; currently ignored.
    pub cursor_position: Option<usize>,
}

impl TranspileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn strict_filter(mut self, strict: bool) -> Self {
        self.strict_filter = Some(strict);
        self
    }

    #[must_use]
    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    #[must_use]
    pub fn filter_only(mut self, filter_only: bool) -> Self {
        self.filter_only = Some(filter_only);
        self
    }

    #[must_use]
    pub fn cursor_position(mut self, position: usize) -> Self {
        self.cursor_position = Some(position);
        self
    }
}
