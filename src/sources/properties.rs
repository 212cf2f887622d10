//! Startup properties and placeholder resolution.

use crate::error::{ConfigError, Result};
use config::{Config, Environment, File};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Property naming the root configuration directory.
pub const CONFIG_DIR_PROPERTY: &str = "application.config.dir";

/// Process-level properties used to resolve descriptor directories.
///
/// Layers (lowest to highest precedence): property files, environment
/// variables, programmatic overrides.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::sources::StartupProperties;
///
/// let props = StartupProperties::builder()
///     .with_override("application.config.dir", "/etc/app")
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     props.resolve_placeholders("${application.config.dir}/tenants").unwrap(),
///     "/etc/app/tenants"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StartupProperties {
    inner: Config,
    pinned: BTreeMap<String, String>,
}

impl StartupProperties {
    /// Create a builder.
    pub fn builder() -> StartupPropertiesBuilder {
        StartupPropertiesBuilder::default()
    }

    /// Properties with no values at all.
    pub fn empty() -> Self {
        Self {
            inner: Config::default(),
            pinned: BTreeMap::new(),
        }
    }

    /// Pin a property on already-built properties. Pinned values win over
    /// every other layer.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pinned.insert(key.into(), value.into());
        self
    }

    /// Look up a property as a string.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.pinned.get(key) {
            Some(value) => Some(value.clone()),
            None => self.inner.get_string(key).ok(),
        }
    }

    /// Replace every `${key}` or `${key:default}` in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnresolvedPlaceholder`] when a key has no value
    /// and no default, or the placeholder is not terminated.
    pub fn resolve_placeholders(&self, text: &str) -> Result<String> {
        let mut resolved = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            resolved.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| ConfigError::UnresolvedPlaceholder {
                key: after.to_string(),
                text: text.to_string(),
            })?;

            let expression = &after[..end];
            let (key, fallback) = match expression.split_once(':') {
                Some((key, fallback)) => (key.trim(), Some(fallback)),
                None => (expression.trim(), None),
            };

            let value = self
                .get(key)
                .or_else(|| fallback.map(str::to_string))
                .ok_or_else(|| ConfigError::UnresolvedPlaceholder {
                    key: key.to_string(),
                    text: text.to_string(),
                })?;
            resolved.push_str(&value);
            rest = &after[end + 1..];
        }

        resolved.push_str(rest);
        Ok(resolved)
    }
}

impl Default for StartupProperties {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builder for [`StartupProperties`].
#[derive(Debug, Default)]
pub struct StartupPropertiesBuilder {
    files: Vec<PathBuf>,
    env: Option<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl StartupPropertiesBuilder {
    /// Add an optional property file (YAML, TOML or JSON by extension).
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Read environment variables with a prefix and nested-key separator.
    ///
    /// `APP_APPLICATION__CONFIG__DIR` maps to `application.config.dir` with
    /// prefix `APP` and separator `__`.
    pub fn with_env(mut self, prefix: &str, separator: &str) -> Self {
        self.env = Some((prefix.to_string(), separator.to_string()));
        self
    }

    /// Set a property directly, overriding files and environment.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Build the layered properties.
    ///
    /// # Errors
    ///
    /// Returns an error if a property file exists but cannot be parsed.
    pub fn build(self) -> Result<StartupProperties> {
        let mut builder = Config::builder();

        for path in self.files {
            builder = builder.add_source(File::from(path).required(false));
        }

        if let Some((prefix, separator)) = &self.env {
            builder = builder.add_source(Environment::with_prefix(prefix).separator(separator));
        }

        for (key, value) in self.overrides {
            builder = builder.set_override(&key, value).map_err(|e| {
                ConfigError::LoadError(format!("Invalid startup property '{}': {}", key, e))
            })?;
        }

        let inner = builder
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to load startup properties: {}", e)))?;

        Ok(StartupProperties {
            inner,
            pinned: BTreeMap::new(),
        })
    }
}
