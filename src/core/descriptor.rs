//! Static descriptors binding configuration types to files.

use crate::error::Result;
use crate::sources::{CONFIG_DIR_PROPERTY, StartupProperties};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Directory placeholder resolving to the root configuration directory.
pub const CONFIG_DIR_PLACEHOLDER: &str = "${application.config.dir}";

/// Filename used when a descriptor does not name one.
pub const DEFAULT_FILENAME: &str = "config.yml";

/// A type whose value is loaded from a file and replaced on change.
///
/// The [`initialize`](Reloadable::initialize) hook runs after every
/// successful construction or defaults merge, before the value is published.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::core::Reloadable;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct SecurityConfig {
///     domain_name: String,
///     #[serde(skip)]
///     origin: String,
/// }
///
/// impl Reloadable for SecurityConfig {
///     fn initialize(&mut self) {
///         self.origin = format!("https://{}", self.domain_name);
///     }
/// }
/// ```
pub trait Reloadable: DeserializeOwned + Send + Sync + 'static {
    /// Called after the value has been constructed from its file.
    fn initialize(&mut self) {}
}

/// Where and how a configuration type is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// Top-level key the type is read from; empty means the whole file.
    pub prefix: String,
    /// Directory, possibly containing `${...}` placeholders; empty means the
    /// root configuration directory.
    pub directory: String,
    /// File name inside the directory.
    pub filename: String,
}

impl ConfigDescriptor {
    /// Descriptor for `prefix` in `config.yml` under the root directory.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            directory: CONFIG_DIR_PLACEHOLDER.to_string(),
            filename: DEFAULT_FILENAME.to_string(),
        }
    }

    /// Use a different file name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Use a different directory (placeholders allowed).
    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Resolve the directory against startup properties.
    ///
    /// An empty directory resolves to the `application.config.dir` property.
    pub fn resolve_directory(&self, properties: &StartupProperties) -> Result<PathBuf> {
        let directory = if self.directory.trim().is_empty() {
            CONFIG_DIR_PLACEHOLDER
        } else {
            self.directory.as_str()
        };
        properties.resolve_placeholders(directory).map(PathBuf::from)
    }

    /// Resolve the full path of the configuration file.
    pub fn resolve_path(&self, properties: &StartupProperties) -> Result<PathBuf> {
        self.resolve_directory(properties)
            .map(|dir| dir.join(&self.filename))
    }
}

/// The root directory configured in `properties`, if any.
pub(crate) fn root_directory(properties: &StartupProperties) -> Option<PathBuf> {
    properties.get(CONFIG_DIR_PROPERTY).map(PathBuf::from)
}

/// Canonicalize when possible so event paths and descriptor paths compare equal.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Normalize a file path through its parent directory, which works for files
/// that do not exist (yet, or any more).
pub(crate) fn normalize_file(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => normalize(parent).join(name),
        _ => path.to_path_buf(),
    }
}
