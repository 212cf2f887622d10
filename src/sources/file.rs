//! File-based configuration source.

use super::format::ConfigFormat;
use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A configuration file on disk and the format used to read it.
///
/// The format is chosen from the configured filename, which may differ from
/// the on-disk name when a descriptor points at a renamed file.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_config::sources::{ConfigFile, ConfigFormat};
///
/// let file = ConfigFile::new("/etc/app/config.yml");
/// assert_eq!(file.format(), ConfigFormat::Yaml);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    format: ConfigFormat,
}

impl ConfigFile {
    /// Create a file source, detecting the format from the path's file name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ConfigFormat::from_filename)
            .unwrap_or(ConfigFormat::Json);
        Self { path, format }
    }

    /// Override the detected format.
    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = format;
        self
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format used to parse the file.
    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Read and parse the file.
    ///
    /// Returns `Ok(None)` when the file does not exist; the caller decides
    /// whether that is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_tree(&self) -> Result<Option<Value>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::IoError(e)),
        };

        self.format.parse(&text).map(Some).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", self.path.display(), e))
        })
    }

    /// Human-readable name for logging.
    pub fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detects_format() {
        assert_eq!(ConfigFile::new("a/config.yaml").format(), ConfigFormat::Yaml);
        assert_eq!(ConfigFile::new("a/app.properties").format(), ConfigFormat::Properties);
        assert_eq!(ConfigFile::new("a/bible.json").format(), ConfigFormat::Json);
        assert_eq!(
            ConfigFile::new("a/data").with_format(ConfigFormat::Properties).format(),
            ConfigFormat::Properties
        );
    }

    #[test]
    fn test_read_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bible.json");
        fs::write(&path, r#"{ "books": [ { "book": "Genesis" } ] }"#).unwrap();

        let tree = ConfigFile::new(&path).read_tree().unwrap().unwrap();
        assert_eq!(tree, json!({ "books": [ { "book": "Genesis" } ] }));
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let source = ConfigFile::new(temp_dir.path().join("absent.json"));
        assert!(source.read_tree().unwrap().is_none());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ broken").unwrap();

        let result = ConfigFile::new(&path).read_tree();
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_name() {
        let source = ConfigFile::new("config.yml");
        assert!(source.name().contains("config.yml"));
    }
}
