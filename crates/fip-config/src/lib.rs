//! Configuration file parsing for FIP (`spec.md` §6, a consumed interface).
//!
//! The master reads one TOML file to discover which interop modules are
//! enabled; each interop module separately reads its own TOML file under
//! `.fip/config/<module_name>.toml` whose schema FIP does not interpret.

use std::fmt;
use std::path::Path;

/// Errors from loading or parsing a FIP configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    /// More than `cap` tables had `enable = true`.
    TooManyModules { cap: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "failed to read config file: {msg}"),
            Self::Parse(msg) => write!(f, "failed to parse config file: {msg}"),
            Self::TooManyModules { cap } => {
                write!(f, "more than {cap} modules enabled in config")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Scans every top-level table whose key starts with `fip-` for a boolean
/// `enable`, returning the enabled keys in the order they appear in the
/// file. Errors if more than `cap` modules are enabled.
pub fn parse_enabled_modules(text: &str, cap: usize) -> Result<Vec<String>, ConfigError> {
    let doc = text
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    let mut enabled = Vec::new();
    for (key, value) in &doc {
        if !key.starts_with("fip-") {
            continue;
        }
        let Some(table) = value.as_table() else {
            continue;
        };
        let is_enabled = table
            .get("enable")
            .and_then(toml::Value::as_bool)
            .unwrap_or(false);
        if is_enabled {
            enabled.push(key.clone());
        }
    }
    if enabled.len() > cap {
        return Err(ConfigError::TooManyModules { cap });
    }
    Ok(enabled)
}

/// Loads the master's TOML configuration file and returns the enabled
/// module names (see [`parse_enabled_modules`]).
pub fn load_enabled_modules(path: &Path, cap: usize) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    parse_enabled_modules(&text, cap)
}

/// Loads `module_name`'s own configuration file as raw TOML text. FIP does
/// not interpret this schema; the interop module owns it.
pub fn load_module_config_text(project_root: &Path, module_name: &str) -> Result<String, ConfigError> {
    let path = project_root
        .join(".fip")
        .join("config")
        .join(format!("{module_name}.toml"));
    std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))
}

/// Parses `module_name`'s own configuration file into a generic
/// [`toml::Value`], for modules that want structure without a fixed schema.
pub fn load_module_config_value(
    project_root: &Path,
    module_name: &str,
) -> Result<toml::Value, ConfigError> {
    let text = load_module_config_text(project_root, module_name)?;
    text.parse::<toml::Value>()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_enabled_fip_tables_in_file_order() {
        let text = r#"
            [fip-c]
            enable = true

            [fip-zig]
            enable = false

            [other-table]
            enable = true

            [fip-rust]
            enable = true
        "#;
        let enabled = parse_enabled_modules(text, 16).unwrap();
        assert_eq!(enabled, vec!["fip-c".to_string(), "fip-rust".to_string()]);
    }

    #[test]
    fn missing_enable_key_is_disabled() {
        let text = "[fip-c]\nother = 1\n";
        assert_eq!(parse_enabled_modules(text, 16).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn cap_exceeded_is_an_error() {
        let text = "[fip-a]\nenable = true\n[fip-b]\nenable = true\n";
        assert_eq!(
            parse_enabled_modules(text, 1),
            Err(ConfigError::TooManyModules { cap: 1 })
        );
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = parse_enabled_modules("not = [valid", 16);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
