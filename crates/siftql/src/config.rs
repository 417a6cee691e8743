use siftql_core::compile::Settings;
use std::path::Path;
use thiserror::Error as ThisError;
use tracing::debug;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Read compiler settings from a TOML file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let settings = settings_from_toml_str(&contents)?;
    debug!(path = %path.display(), "settings loaded");

    Ok(settings)
}

/// Parse compiler settings; absent keys keep their defaults.
pub fn settings_from_toml_str(text: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml::from_str(text)?;
    if settings.node_name.trim().is_empty() {
        return Err(ConfigError::Invalid("node_name must not be empty".to_string()));
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_keep_defaults() {
        let settings = settings_from_toml_str("case_sensitive = true\n").expect("parses");

        assert!(settings.case_sensitive);
        assert!(settings.strict_filter);
        assert_eq!(settings.node_name, "node");
    }

    #[test]
    fn full_settings_parse() {
        let text = r#"
            case_sensitive = false
            strict_equality = true
            strict_filter = false
            filter_only = true
            node_name = "item.a[0].c"
        "#;

        let settings = settings_from_toml_str(text).expect("parses");

        assert!(settings.strict_equality);
        assert!(!settings.strict_filter);
        assert!(settings.filter_only);
        assert_eq!(settings.node_name, "item.a[0].c");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = settings_from_toml_str("strict = true\n").expect_err("unknown key");

        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn empty_node_name_is_invalid() {
        let err = settings_from_toml_str("node_name = \"  \"\n").expect_err("empty node");

        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_settings("/nonexistent/siftql.toml").expect_err("no such file");

        assert!(matches!(err, ConfigError::Io(_)));
    }
}
