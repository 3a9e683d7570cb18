use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use toml::Value;

pub const DEFAULT_CONFIG_PATH: &str = "foreman.toml";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub heartbeat: HeartbeatConfig,
    pub controller: ControllerConfig,
    pub node: NodeConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub human_friendly: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ControllerConfig {
    pub schematic_file: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_owned(),
                human_friendly: false,
            },
            heartbeat: HeartbeatConfig { interval_ms: 1000 },
            controller: ControllerConfig {
                schematic_file: "fleet.json".to_owned(),
            },
            node: NodeConfig {
                host: "0.0.0.0".to_owned(),
                port: 9410,
            },
        }
    }
}

impl AppConfig {
    /// Resolves the config file (`--config <path>` beats the default path),
    /// then applies the remaining `--section.key value` overrides. A missing
    /// default file falls back to built-in defaults; an explicitly named file
    /// must exist.
    pub fn load_with_discovery(
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        let (config_path, remaining) = extract_config_path(args)?;

        let root_value = match &config_path {
            Some(path) => read_toml_value(Path::new(path))?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    read_toml_value(default_path)?
                } else {
                    Value::try_from(AppConfig::default()).map_err(ConfigError::Serialize)?
                }
            }
        };

        Self::apply_overrides(root_value, remaining)
    }

    pub fn load_from_toml_with_args(
        path: impl AsRef<Path>,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        let root_value = read_toml_value(path.as_ref())?;
        let overrides = parse_cli_overrides(args)?;
        Self::apply_parsed_overrides(root_value, overrides)
    }

    fn apply_overrides(
        root_value: Value,
        args: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let overrides = parse_cli_overrides(args)?;
        Self::apply_parsed_overrides(root_value, overrides)
    }

    fn apply_parsed_overrides(
        mut root_value: Value,
        overrides: Vec<(String, String)>,
    ) -> Result<Self, ConfigError> {
        for (key_path, raw_value) in overrides {
            apply_override(&mut root_value, &key_path, &raw_value)?;
        }
        root_value.try_into().map_err(ConfigError::Deserialize)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    TomlParse {
        path: String,
        source: toml::de::Error,
    },
    Deserialize(toml::de::Error),
    Serialize(toml::ser::Error),
    MissingValueForArg {
        key: String,
    },
    InvalidArgFormat {
        arg: String,
    },
    UnknownPath {
        key: String,
    },
    UnsupportedOverrideType {
        key: String,
    },
    InvalidValueForType {
        key: String,
        expected: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file '{path}': {source}")
            }
            Self::TomlParse { path, source } => {
                write!(f, "failed to parse TOML config '{path}': {source}")
            }
            Self::Deserialize(source) => write!(f, "failed to deserialize config: {source}"),
            Self::Serialize(source) => {
                write!(f, "failed to render built-in default config: {source}")
            }
            Self::MissingValueForArg { key } => {
                write!(f, "missing value for CLI override '--{key}'")
            }
            Self::InvalidArgFormat { arg } => write!(
                f,
                "invalid CLI argument format '{arg}', expected '--section.key value'"
            ),
            Self::UnknownPath { key } => write!(f, "unknown override key path '{key}'"),
            Self::UnsupportedOverrideType { key } => {
                write!(f, "override not supported for complex TOML type at '{key}'")
            }
            Self::InvalidValueForType {
                key,
                expected,
                value,
            } => write!(
                f,
                "invalid value '{value}' for '{key}', expected type {expected}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

fn read_toml_value(path: &Path) -> Result<Value, ConfigError> {
    let toml_content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;

    toml_content.parse().map_err(|source| ConfigError::TomlParse {
        path: path.to_string_lossy().to_string(),
        source,
    })
}

fn extract_config_path(
    args: impl IntoIterator<Item = String>,
) -> Result<(Option<String>, Vec<String>), ConfigError> {
    let mut config_path = None;
    let mut remaining = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter.next().ok_or_else(|| ConfigError::MissingValueForArg {
                key: "config".to_owned(),
            })?;
            config_path = Some(value);
        } else {
            remaining.push(arg);
        }
    }

    Ok((config_path, remaining))
}

fn parse_cli_overrides(
    args: impl IntoIterator<Item = String>,
) -> Result<Vec<(String, String)>, ConfigError> {
    let mut parsed = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        let Some(stripped) = arg.strip_prefix("--") else {
            return Err(ConfigError::InvalidArgFormat { arg });
        };

        if stripped.is_empty() {
            return Err(ConfigError::InvalidArgFormat { arg });
        }

        // both '--section.key value' and '--section.key=value' are accepted
        if let Some((key, value)) = stripped.split_once('=') {
            if key.is_empty() {
                return Err(ConfigError::InvalidArgFormat { arg });
            }
            parsed.push((key.to_owned(), value.to_owned()));
            continue;
        }

        let value = iter.next().ok_or_else(|| ConfigError::MissingValueForArg {
            key: stripped.to_owned(),
        })?;
        parsed.push((stripped.to_owned(), value));
    }

    Ok(parsed)
}

fn apply_override(root: &mut Value, key_path: &str, raw_value: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = key_path.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(ConfigError::UnknownPath {
            key: key_path.to_owned(),
        });
    }

    let mut current = root;
    for section in &parts[..parts.len() - 1] {
        let table = current
            .as_table_mut()
            .ok_or_else(|| ConfigError::UnknownPath {
                key: key_path.to_owned(),
            })?;
        current = table
            .get_mut(*section)
            .ok_or_else(|| ConfigError::UnknownPath {
                key: key_path.to_owned(),
            })?;
    }

    let final_key = parts[parts.len() - 1];
    let table = current
        .as_table_mut()
        .ok_or_else(|| ConfigError::UnknownPath {
            key: key_path.to_owned(),
        })?;
    let current_value = table
        .get_mut(final_key)
        .ok_or_else(|| ConfigError::UnknownPath {
            key: key_path.to_owned(),
        })?;

    *current_value = parse_value_using_current_type(key_path, raw_value, current_value)?;
    Ok(())
}

fn parse_value_using_current_type(
    key_path: &str,
    raw_value: &str,
    current_value: &Value,
) -> Result<Value, ConfigError> {
    match current_value {
        Value::String(_) => Ok(Value::String(raw_value.to_owned())),
        Value::Integer(_) => raw_value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| ConfigError::InvalidValueForType {
                key: key_path.to_owned(),
                expected: "integer",
                value: raw_value.to_owned(),
            }),
        Value::Float(_) => raw_value
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ConfigError::InvalidValueForType {
                key: key_path.to_owned(),
                expected: "float",
                value: raw_value.to_owned(),
            }),
        Value::Boolean(_) => raw_value
            .parse::<bool>()
            .map(Value::Boolean)
            .map_err(|_| ConfigError::InvalidValueForType {
                key: key_path.to_owned(),
                expected: "boolean",
                value: raw_value.to_owned(),
            }),
        Value::Datetime(_) | Value::Array(_) | Value::Table(_) => {
            Err(ConfigError::UnsupportedOverrideType {
                key: key_path.to_owned(),
            })
        }
    }
}
