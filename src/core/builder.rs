//! Builder for constructing ReloadEngine instances.

use crate::core::engine::{LoadFn, Registration};
use crate::core::{ConfigDescriptor, ConfigLoader, ErasedConfig, ReloadEngine, Reloadable, normalize};
use crate::error::{ConfigError, Result};
use crate::notify::{ChangeNotifier, DirectoryWatcher};
use crate::sources::{CONFIG_DIR_PROPERTY, StartupProperties};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::TypeId;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct PendingRegistration {
    type_id: TypeId,
    type_name: &'static str,
    descriptor: ConfigDescriptor,
    load: LoadFn,
}

/// Builder for constructing a [`ReloadEngine`].
///
/// Registrations form the explicit table of reloadable types; each one
/// binds a type to a [`ConfigDescriptor`].
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_config::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct SecurityConfig {
///     domain_name: String,
/// }
///
/// impl Reloadable for SecurityConfig {}
///
/// # fn example() -> Result<()> {
/// let engine = ReloadEngine::builder()
///     .with_root_dir("/etc/app")
///     .register::<SecurityConfig>(ConfigDescriptor::new("security"))
///     .build()?;
/// engine.start()?;
/// # Ok(())
/// # }
/// ```
pub struct ReloadEngineBuilder {
    properties: Option<StartupProperties>,
    root_dir: Option<PathBuf>,
    loader: ConfigLoader,
    pending: Vec<PendingRegistration>,
}

impl ReloadEngineBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            properties: None,
            root_dir: None,
            loader: ConfigLoader::new(),
            pending: Vec::new(),
        }
    }

    /// Set the root configuration directory.
    ///
    /// Takes precedence over an `application.config.dir` startup property.
    pub fn with_root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root.into());
        self
    }

    /// Use these startup properties for placeholder resolution.
    pub fn with_properties(mut self, properties: StartupProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Use a specific loader.
    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Register `T` to be loaded as described by `descriptor`.
    pub fn register<T: Reloadable>(mut self, descriptor: ConfigDescriptor) -> Self {
        let load: LoadFn = Arc::new(|loader: &ConfigLoader, path: &Path, descriptor: &ConfigDescriptor| {
            loader
                .load::<T>(path, &descriptor.filename, &descriptor.prefix)
                .map(|outcome| outcome.map(|value| Arc::new(value) as ErasedConfig))
        });
        self.push::<T>(descriptor, load);
        self
    }

    /// Register `T`, overlaying each load onto a copy of `defaults`.
    pub fn register_with_defaults<T>(mut self, descriptor: ConfigDescriptor, defaults: T) -> Self
    where
        T: Reloadable + Serialize,
    {
        let defaults = Arc::new(defaults);
        let load: LoadFn = Arc::new(move |loader: &ConfigLoader, path: &Path, descriptor: &ConfigDescriptor| {
            loader
                .load_with_defaults(path, &descriptor.filename, &descriptor.prefix, defaults.as_ref())
                .map(|outcome| outcome.map(|value| Arc::new(value) as ErasedConfig))
        });
        self.push::<T>(descriptor, load);
        self
    }

    fn push<T: 'static>(&mut self, descriptor: ConfigDescriptor, load: LoadFn) {
        self.pending.push(PendingRegistration {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            descriptor,
            load,
        });
    }

    /// Build the engine.
    ///
    /// Resolves every descriptor's directory and creates the watcher. Nothing
    /// is loaded until [`ReloadEngine::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A descriptor directory has an unresolvable placeholder
    /// - A type is registered twice
    /// - The file watcher cannot be created
    pub fn build(self) -> Result<ReloadEngine> {
        let mut properties = self.properties.unwrap_or_default();
        if let Some(root) = &self.root_dir {
            properties = properties.with_value(CONFIG_DIR_PROPERTY, root.to_string_lossy());
        }

        let mut registrations: Vec<Registration> = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            if registrations.iter().any(|r| r.type_id == pending.type_id) {
                return Err(ConfigError::Other(format!(
                    "{} is registered more than once",
                    pending.type_name
                )));
            }

            let directory = normalize(&pending.descriptor.resolve_directory(&properties)?);
            let path = directory.join(&pending.descriptor.filename);
            registrations.push(Registration {
                type_id: pending.type_id,
                type_name: pending.type_name,
                descriptor: pending.descriptor,
                directory,
                path,
                load: pending.load,
                reload_lock: Mutex::new(()),
            });
        }

        let watcher = Arc::new(DirectoryWatcher::new()?);
        Ok(ReloadEngine::assemble(
            properties,
            self.loader,
            registrations,
            watcher,
            ChangeNotifier::new(),
        ))
    }
}

impl Default for ReloadEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadEngine {
    /// Create a new builder for constructing an engine.
    pub fn builder() -> ReloadEngineBuilder {
        ReloadEngineBuilder::new()
    }
}
