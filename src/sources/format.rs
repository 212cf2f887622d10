//! Format detection and parsing into a generic value tree.

use crate::error::{ConfigError, Result};
use serde_json::{Map, Value};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yml`, `.yaml`), struct fields spelled in kebab-case.
    Yaml,
    /// Java-style properties (`.properties`), flat dotted keys.
    Properties,
    /// TOML (`.toml`).
    Toml,
    /// JSON, the fallback for every other suffix.
    Json,
}

impl ConfigFormat {
    /// Select a format from a file name suffix.
    ///
    /// - `.yaml`, `.yml` -> YAML
    /// - `.properties` -> properties
    /// - `.toml` -> TOML
    /// - anything else -> JSON
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reloadable_config::sources::ConfigFormat;
    ///
    /// assert_eq!(ConfigFormat::from_filename("config.yml"), ConfigFormat::Yaml);
    /// assert_eq!(ConfigFormat::from_filename("bible.json"), ConfigFormat::Json);
    /// assert_eq!(ConfigFormat::from_filename("settings"), ConfigFormat::Json);
    /// ```
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".yml") || lower.ends_with(".yaml") {
            Self::Yaml
        } else if lower.ends_with(".properties") {
            Self::Properties
        } else if lower.ends_with(".toml") {
            Self::Toml
        } else {
            Self::Json
        }
    }

    /// How struct field names are spelled in files of this format.
    pub fn naming(self) -> FieldNaming {
        match self {
            Self::Yaml => FieldNaming::KebabCase,
            Self::Properties | Self::Toml | Self::Json => FieldNaming::CamelCase,
        }
    }

    /// Parse file contents into a generic tree.
    ///
    /// Blank input yields `Value::Null`.
    pub fn parse(self, text: &str) -> Result<Value> {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        match self {
            Self::Yaml => parse_yaml(text),
            Self::Properties => Ok(parse_properties(text)),
            Self::Toml => parse_toml(text),
            Self::Json => serde_json::from_str(text)
                .map_err(|e| ConfigError::DeserializationError(format!("invalid JSON: {}", e))),
        }
    }
}

/// Field naming convention used to match file keys to struct fields.
///
/// The exact Rust field name is always accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNaming {
    /// `fixed_delay` is spelled `fixed-delay`.
    KebabCase,
    /// `fixed_delay` is spelled `fixedDelay`.
    CamelCase,
}

impl FieldNaming {
    /// Spell a snake_case field name in this convention.
    pub fn convert(self, field: &str) -> String {
        match self {
            Self::KebabCase => field.replace('_', "-"),
            Self::CamelCase => {
                let mut out = String::with_capacity(field.len());
                let mut upper_next = false;
                for ch in field.chars() {
                    if ch == '_' {
                        upper_next = !out.is_empty();
                    } else if upper_next {
                        out.extend(ch.to_uppercase());
                        upper_next = false;
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }

    /// Whether a file key names the given field.
    pub fn matches(self, field: &str, key: &str) -> bool {
        field == key || self.convert(field) == key
    }

    /// Find the field a key refers to.
    pub(crate) fn field_for(self, key: &str, fields: &'static [&'static str]) -> Option<&'static str> {
        fields.iter().copied().find(|field| self.matches(field, key))
    }
}

#[cfg(feature = "yaml")]
fn parse_yaml(text: &str) -> Result<Value> {
    serde_yaml::from_str(text)
        .map_err(|e| ConfigError::DeserializationError(format!("invalid YAML: {}", e)))
}

#[cfg(not(feature = "yaml"))]
fn parse_yaml(_text: &str) -> Result<Value> {
    Err(ConfigError::FeatureNotEnabled("yaml"))
}

#[cfg(feature = "toml")]
fn parse_toml(text: &str) -> Result<Value> {
    toml::from_str(text)
        .map_err(|e| ConfigError::DeserializationError(format!("invalid TOML: {}", e)))
}

#[cfg(not(feature = "toml"))]
fn parse_toml(_text: &str) -> Result<Value> {
    Err(ConfigError::FeatureNotEnabled("toml"))
}

/// Parse properties text into a nested tree of string values.
///
/// Dotted keys nest (`a.b=1` becomes `{"a": {"b": "1"}}`). A later scalar
/// never replaces an existing object, and a later nested key replaces a
/// scalar at the same position.
fn parse_properties(text: &str) -> Value {
    let mut root = Map::new();
    let mut logical = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        if let Some(continued) = line.strip_suffix('\\') {
            logical.push_str(continued);
            continue;
        }
        logical.push_str(line);

        let entry = std::mem::take(&mut logical);
        insert_property(&mut root, &entry);
    }

    if !logical.is_empty() {
        insert_property(&mut root, &logical);
    }

    Value::Object(root)
}

fn insert_property(root: &mut Map<String, Value>, entry: &str) {
    let split = entry.find(['=', ':']);
    let (key, value) = match split {
        Some(at) => (entry[..at].trim(), entry[at + 1..].trim()),
        None => (entry.trim(), ""),
    };
    if key.is_empty() {
        return;
    }

    let mut segments: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot.as_object_mut() {
            Some(map) => map,
            None => return,
        };
    }

    match current.get(last) {
        Some(Value::Object(_)) => {}
        _ => {
            current.insert(last.to_string(), Value::String(value.to_string()));
        }
    }
}
