//! Configuration loader turning files into typed values.

use crate::core::Reloadable;
use crate::error::{ConfigError, Result};
use crate::sources::tree::{from_tree, overlay};
use crate::sources::{ConfigFile, ConfigFormat};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Outcome of loading one configuration type from one file.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    /// The file contained a value for the type.
    Loaded(T),
    /// The file exists but has no subtree under the prefix (or is empty).
    NotConfigured,
    /// The file does not exist.
    NotFound(PathBuf),
}

impl<T> LoadOutcome<T> {
    /// The loaded value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::NotConfigured | Self::NotFound(_) => None,
        }
    }

    /// Whether a value was loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Map the loaded value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadOutcome<U> {
        match self {
            Self::Loaded(value) => LoadOutcome::Loaded(f(value)),
            Self::NotConfigured => LoadOutcome::NotConfigured,
            Self::NotFound(path) => LoadOutcome::NotFound(path),
        }
    }
}

/// Loads typed configuration values from files.
///
/// The parser is selected from the configured filename: YAML for
/// `.yml`/`.yaml` (kebab-case fields), properties for `.properties`, and
/// JSON-like structured text otherwise. Unknown fields are ignored.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_config::core::{ConfigLoader, LoadOutcome, Reloadable};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct UserConfig {
///     send_address: String,
/// }
///
/// impl Reloadable for UserConfig {}
///
/// # fn example() -> reloadable_config::error::Result<()> {
/// let loader = ConfigLoader::new();
/// match loader.load::<UserConfig>("/etc/app/config.yml".as_ref(), "config.yml", "user-service")? {
///     LoadOutcome::Loaded(cfg) => println!("sending from {}", cfg.send_address),
///     LoadOutcome::NotConfigured => println!("no user-service section yet"),
///     LoadOutcome::NotFound(path) => println!("{} is missing", path.display()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    _private: (),
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `T` from `file`, reading the subtree under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the subtree
    /// does not deserialize into `T`.
    pub fn load<T: Reloadable>(&self, file: &Path, filename: &str, prefix: &str) -> Result<LoadOutcome<T>> {
        let format = ConfigFormat::from_filename(filename);
        let subtree = match self.read_subtree(file, format, prefix)? {
            LoadOutcome::Loaded(subtree) => subtree,
            LoadOutcome::NotConfigured => return Ok(LoadOutcome::NotConfigured),
            LoadOutcome::NotFound(path) => return Ok(LoadOutcome::NotFound(path)),
        };

        trace!(file = %file.display(), type_name = std::any::type_name::<T>(), "No default values");
        let value: T = from_tree(subtree, format.naming()).map_err(|e| parse_error::<T>(file, e))?;
        Ok(LoadOutcome::Loaded(finish(value)))
    }

    /// Load `T` from `file`, overlaying the file's subtree onto a deep copy
    /// of `defaults`. Fields the file does not set keep their default.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), plus failure to serialize `defaults`.
    pub fn load_with_defaults<T>(
        &self,
        file: &Path,
        filename: &str,
        prefix: &str,
        defaults: &T,
    ) -> Result<LoadOutcome<T>>
    where
        T: Reloadable + Serialize,
    {
        let format = ConfigFormat::from_filename(filename);
        let subtree = match self.read_subtree(file, format, prefix)? {
            LoadOutcome::Loaded(subtree) => subtree,
            LoadOutcome::NotConfigured => return Ok(LoadOutcome::NotConfigured),
            LoadOutcome::NotFound(path) => return Ok(LoadOutcome::NotFound(path)),
        };

        let mut merged = serde_json::to_value(defaults).map_err(|e| {
            ConfigError::DeserializationError(format!(
                "Failed to copy defaults for {}: {}",
                std::any::type_name::<T>(),
                e
            ))
        })?;
        trace!(file = %file.display(), type_name = std::any::type_name::<T>(), "Applying default values");
        overlay(&mut merged, subtree, format.naming());

        let value: T = from_tree(merged, format.naming()).map_err(|e| parse_error::<T>(file, e))?;
        Ok(LoadOutcome::Loaded(finish(value)))
    }

    fn read_subtree(&self, file: &Path, format: ConfigFormat, prefix: &str) -> Result<LoadOutcome<Value>> {
        let Some(root) = ConfigFile::new(file).with_format(format).read_tree()? else {
            return Ok(LoadOutcome::NotFound(file.to_path_buf()));
        };

        let prefix = prefix.trim();
        let subtree = if prefix.is_empty() {
            root
        } else {
            trace!(prefix, file = %file.display(), "Selecting prefix node");
            match root {
                Value::Object(mut map) => map.remove(prefix).unwrap_or(Value::Null),
                _ => Value::Null,
            }
        };

        if subtree.is_null() {
            return Ok(LoadOutcome::NotConfigured);
        }
        Ok(LoadOutcome::Loaded(subtree))
    }
}

fn finish<T: Reloadable>(mut value: T) -> T {
    trace!(type_name = std::any::type_name::<T>(), "Initialising configuration");
    value.initialize();
    value
}

fn parse_error<T>(file: &Path, err: serde_json::Error) -> ConfigError {
    ConfigError::ParseError {
        file: file.to_path_buf(),
        target: std::any::type_name::<T>(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    struct ChatConfig {
        api_key: String,
        #[serde(default)]
        temperature: f64,
        #[serde(skip)]
        initialised: bool,
    }

    impl Reloadable for ChatConfig {
        fn initialize(&mut self) {
            self.initialised = true;
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_json_with_prefix() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.json", r#"{ "chat-gpt": { "apiKey": "k-1", "temperature": 0.5 } }"#);

        let loaded = ConfigLoader::new()
            .load::<ChatConfig>(&path, "app.json", "chat-gpt")
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(loaded.api_key, "k-1");
        assert_eq!(loaded.temperature, 0.5);
        assert!(loaded.initialised);
    }

    #[test]
    fn test_load_without_prefix_reads_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "chat.json", r#"{ "api_key": "k-2" }"#);

        let loaded = ConfigLoader::new()
            .load::<ChatConfig>(&path, "chat.json", "")
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(loaded.api_key, "k-2");
    }

    #[test]
    fn test_missing_prefix_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.json", r#"{ "security": {} }"#);

        let outcome = ConfigLoader::new()
            .load::<ChatConfig>(&path, "app.json", "chat-gpt")
            .unwrap();
        assert!(matches!(outcome, LoadOutcome::NotConfigured));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        let outcome = ConfigLoader::new()
            .load::<ChatConfig>(&path, "absent.json", "")
            .unwrap();
        assert!(matches!(outcome, LoadOutcome::NotFound(p) if p == path));
    }

    #[test]
    fn test_type_mismatch_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.json", r#"{ "chat-gpt": { "temperature": 0.1 } }"#);

        let result = ConfigLoader::new().load::<ChatConfig>(&path, "app.json", "chat-gpt");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_defaults_overlay() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.json", r#"{ "chat-gpt": { "temperature": 0.9 } }"#);
        let defaults = ChatConfig {
            api_key: "default-key".to_string(),
            temperature: 0.2,
            initialised: false,
        };

        let loaded = ConfigLoader::new()
            .load_with_defaults(&path, "app.json", "chat-gpt", &defaults)
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(loaded.api_key, "default-key");
        assert_eq!(loaded.temperature, 0.9);
        assert!(loaded.initialised);
        // The defaults themselves are untouched
        assert_eq!(defaults.temperature, 0.2);
    }

    #[test]
    fn test_load_properties() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "app.properties",
            "chat-gpt.apiKey=from-props\nchat-gpt.temperature=1.5\n",
        );

        let loaded = ConfigLoader::new()
            .load::<ChatConfig>(&path, "app.properties", "chat-gpt")
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(loaded.api_key, "from-props");
        assert_eq!(loaded.temperature, 1.5);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_load_yaml_kebab_case() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.yml", "chat-gpt:\n  api-key: from-yaml\n  unknown-field: 1\n");

        let loaded = ConfigLoader::new()
            .load::<ChatConfig>(&path, "config.yml", "chat-gpt")
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(loaded.api_key, "from-yaml");
        assert_eq!(loaded.temperature, 0.0);
    }
}
