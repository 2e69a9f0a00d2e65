use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::{AppConfig, ThemeMode};

/// Error type for config.toml I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not parse config.toml: {0}")]
    DocumentError(#[from] toml_edit::TomlError),
    #[error("unknown config key '{0}' (see `np config show`)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, Copy)]
enum ValueKind {
    Text,
    Integer,
    Bool,
    Theme,
}

/// Keys `np config set` accepts, as `section.field`
const KEYS: &[(&str, ValueKind)] = &[
    ("server.api_url", ValueKind::Text),
    ("server.timeout_secs", ValueKind::Integer),
    ("ui.theme", ValueKind::Theme),
    ("ui.default_sort", ValueKind::Text),
    ("ui.color", ValueKind::Bool),
    ("cache.ttl_secs", ValueKind::Integer),
];

pub fn known_keys() -> impl Iterator<Item = &'static str> {
    KEYS.iter().map(|(k, _)| *k)
}

/// Read the config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing. A missing file yields
/// defaults and an empty document.
pub fn read_config(path: &Path) -> Result<(AppConfig, toml_edit::DocumentMut), ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let config: AppConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    read_config(path).map(|(config, _)| config)
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let write_err = |e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, doc.to_string()).map_err(write_err)
}

/// Set `section.field` in the document, typed according to the key.
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, raw: &str) -> Result<(), ConfigError> {
    let kind = KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let value = match kind {
        ValueKind::Text => toml_edit::value(raw),
        ValueKind::Integer => {
            let n: i64 = raw
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a whole number", raw)))?;
            if n < 0 {
                return Err(invalid("must not be negative".into()));
            }
            toml_edit::value(n)
        }
        ValueKind::Bool => {
            let b: bool = raw
                .parse()
                .map_err(|_| invalid(format!("'{}' is not true or false", raw)))?;
            toml_edit::value(b)
        }
        ValueKind::Theme => {
            let theme: ThemeMode = raw.parse().map_err(invalid)?;
            toml_edit::value(theme.as_str())
        }
    };

    let (section, field) = key.split_once('.').unwrap_or(("", key));
    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = value;
    Ok(())
}

/// Render the effective value of a key from a parsed config
pub fn get_value(config: &AppConfig, key: &str) -> Result<String, ConfigError> {
    let value = match key {
        "server.api_url" => config.server.api_url.clone(),
        "server.timeout_secs" => config.server.timeout_secs.to_string(),
        "ui.theme" => config.ui.theme.to_string(),
        "ui.default_sort" => config.ui.default_sort.clone(),
        "ui.color" => config.ui.color.to_string(),
        "cache.ttl_secs" => config.cache.ttl_secs.to_string(),
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    };
    Ok(value)
}
