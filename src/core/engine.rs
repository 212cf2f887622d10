//! The reload engine wiring watcher, loader, registry and notifier together.

use crate::core::descriptor::{normalize_file, root_directory};
use crate::core::{ConfigDescriptor, ConfigEntry, ConfigLoader, ConfigRegistry, ErasedConfig, Live, LoadOutcome};
use crate::error::{ConfigError, Result};
use crate::notify::{ChangeNotifier, ConfigurationChanged, DirectoryWatcher, FileChangeKind, FileChanged};
use crate::sources::StartupProperties;
use parking_lot::Mutex;
use std::any::TypeId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, info_span, warn};

/// Type-erased load function for one registered type.
pub(crate) type LoadFn =
    Arc<dyn Fn(&ConfigLoader, &Path, &ConfigDescriptor) -> Result<LoadOutcome<ErasedConfig>> + Send + Sync>;

/// One row of the registration table.
pub(crate) struct Registration {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) descriptor: ConfigDescriptor,
    pub(crate) directory: PathBuf,
    pub(crate) path: PathBuf,
    pub(crate) load: LoadFn,
    /// Held across load and install so reloads of one type never overlap.
    pub(crate) reload_lock: Mutex<()>,
}

impl Registration {
    /// Whether `path` (already normalized) is this registration's file.
    ///
    /// The registered path is normalized again on every check because its
    /// directory may not have existed, or may have been reached through a
    /// symlink, when the engine was built.
    fn is_bound_to(&self, path: &Path) -> bool {
        self.path == path || normalize_file(&self.path) == path
    }
}

struct EngineInner {
    properties: StartupProperties,
    loader: ConfigLoader,
    registrations: Vec<Registration>,
    registry: Arc<ConfigRegistry>,
    notifier: ChangeNotifier,
    watcher: Arc<DirectoryWatcher>,
}

impl EngineInner {
    /// Load one registration and, on success, install and announce it.
    fn reload(&self, registration: &Registration) -> Result<LoadOutcome<()>> {
        let descriptor = &registration.descriptor;
        let installed = {
            let _serialized = registration.reload_lock.lock();
            let outcome = (registration.load)(&self.loader, &registration.path, descriptor)?;
            outcome.map(|value| {
                self.registry.put(ConfigEntry::erased(
                    registration.type_id,
                    registration.type_name,
                    descriptor.filename.clone(),
                    descriptor.prefix.clone(),
                    value,
                ))
            })
        };

        // Handlers run outside the lock so they may trigger reloads themselves
        Ok(installed.map(|entry| {
            info!(
                path = %registration.path.display(),
                prefix = %descriptor.prefix,
                type_name = registration.type_name,
                "Configuration loaded"
            );
            self.notifier.publish(&ConfigurationChanged::from_entry(&entry));
        }))
    }

    fn initial_load(&self) {
        for registration in &self.registrations {
            match self.reload(registration) {
                Ok(LoadOutcome::Loaded(())) => {}
                Ok(LoadOutcome::NotConfigured) => {
                    warn!(
                        path = %registration.path.display(),
                        prefix = %registration.descriptor.prefix,
                        type_name = registration.type_name,
                        "No configuration under prefix"
                    );
                }
                Ok(LoadOutcome::NotFound(path)) => {
                    error!(path = %path.display(), type_name = registration.type_name, "Configuration file not found");
                }
                Err(e) => {
                    error!(
                        path = %registration.path.display(),
                        type_name = registration.type_name,
                        error = %e,
                        "Failed to load configuration"
                    );
                }
            }
        }
    }

    /// Reload every registration bound to `path`.
    fn reload_path(&self, path: &Path) -> Result<usize> {
        let path = normalize_file(path);
        self.reload_matching(|registration| registration.is_bound_to(&path))
    }

    fn reload_matching(&self, mut selected: impl FnMut(&Registration) -> bool) -> Result<usize> {
        let mut installed = 0;
        let mut first_error = None;

        for registration in self.registrations.iter().filter(|r| selected(r)) {
            match self.reload(registration) {
                Ok(LoadOutcome::Loaded(())) => installed += 1,
                Ok(LoadOutcome::NotConfigured) => {
                    debug!(path = %registration.path.display(), type_name = registration.type_name, "Nothing configured");
                }
                Ok(LoadOutcome::NotFound(path)) => {
                    debug!(path = %path.display(), type_name = registration.type_name, "File vanished before reload");
                }
                Err(e) => {
                    // Readers keep the last good value
                    error!(
                        path = %registration.path.display(),
                        type_name = registration.type_name,
                        error = %e,
                        "Failed to reload configuration"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(installed),
        }
    }

    fn handle(&self, change: FileChanged) -> Result<()> {
        match change.kind {
            FileChangeKind::Created | FileChangeKind::Modified => {
                // Failures are logged per registration; the loop carries on
                let _ = self.reload_path(&change.path);
                Ok(())
            }
            FileChangeKind::Deleted => {
                let path = normalize_file(&change.path);
                for registration in self.registrations.iter().filter(|r| r.is_bound_to(&path)) {
                    warn!(
                        path = %path.display(),
                        type_name = registration.type_name,
                        "Configuration file deleted, keeping current value"
                    );
                }
                Ok(())
            }
            FileChangeKind::Overflow => Err(ConfigError::EventOverflow(change.path)),
        }
    }
}

/// Keeps registered configuration types loaded and current.
///
/// [`start`](Self::start) monitors the configured directories, performs the
/// initial load of every registration and starts a `config-watcher` thread
/// that reloads a type whenever its file changes. Each successful reload is
/// installed in the [`ConfigRegistry`] and announced through the
/// [`ChangeNotifier`]; a failed reload leaves the previous value in place.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_config::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct UserServiceConfig {
///     send_address: String,
/// }
///
/// impl Reloadable for UserServiceConfig {}
///
/// # fn example() -> Result<()> {
/// let engine = ReloadEngine::builder()
///     .with_root_dir("/etc/app")
///     .register::<UserServiceConfig>(ConfigDescriptor::new("user-service"))
///     .build()?;
/// engine.start()?;
///
/// let users = engine.live::<UserServiceConfig>();
/// if let Some(address) = users.with(|cfg| cfg.send_address.clone()) {
///     println!("sending from {}", address);
/// }
///
/// engine.stop();
/// # Ok(())
/// # }
/// ```
pub struct ReloadEngine {
    inner: Arc<EngineInner>,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
    started: AtomicBool,
}

impl ReloadEngine {
    pub(crate) fn assemble(
        properties: StartupProperties,
        loader: ConfigLoader,
        registrations: Vec<Registration>,
        watcher: Arc<DirectoryWatcher>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                properties,
                loader,
                registrations,
                registry: Arc::new(ConfigRegistry::new()),
                notifier,
                watcher,
            }),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Monitor, load everything once, then watch for changes.
    ///
    /// Types whose file is missing or invalid are logged and left
    /// unregistered; they are picked up once their file appears or is fixed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine was already started or the watcher
    /// thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::WatchError("Reload engine already started".to_string()));
        }

        let inner = &self.inner;
        if let Some(root) = root_directory(&inner.properties) {
            inner.watcher.monitor(root);
        }
        for registration in &inner.registrations {
            inner.watcher.monitor(&registration.directory);
        }

        inner.initial_load();

        let looped = Arc::clone(inner);
        let handle = thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || {
                let span = info_span!("config_watcher");
                let _entered = span.enter();
                let result = looped.watcher.run(|change| looped.handle(change));
                match &result {
                    Ok(()) => debug!("Configuration watcher stopped"),
                    Err(e) => error!(error = %e, "Configuration watcher terminated"),
                }
                result
            })?;
        *self.worker.lock() = Some(handle);

        info!(
            registrations = inner.registrations.len(),
            directories = inner.watcher.subscription_count(),
            "Reload engine started"
        );
        Ok(())
    }

    /// Stop watching. Loaded values stay readable.
    ///
    /// Calling this more than once is harmless.
    pub fn stop(&self) {
        self.inner.watcher.stop();
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("Configuration watcher thread panicked");
            }
        }
    }

    /// Whether the watcher thread is running.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Re-read every registration now.
    ///
    /// Returns the number of types whose value was replaced. May run while
    /// the watcher thread is reloading; loads of one type are serialized,
    /// so the last load to finish is the one installed.
    ///
    /// # Errors
    ///
    /// Returns the first load error; other registrations are still processed.
    pub fn reload_all(&self) -> Result<usize> {
        self.inner.reload_matching(|_| true)
    }

    /// Re-read every registration bound to `path`.
    ///
    /// # Errors
    ///
    /// Returns the first load error; other registrations are still processed.
    pub fn reload_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.inner.reload_path(path.as_ref())
    }

    /// A long-lived handle to the current value of `T`.
    pub fn live<T: Send + Sync + 'static>(&self) -> Live<T> {
        Live::new(Arc::clone(&self.inner.registry))
    }

    /// Current value of `T`, if loaded.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.registry.get::<T>()
    }

    /// The registry holding current values.
    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.inner.registry
    }

    /// The change notifier.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    /// The directory watcher.
    pub fn watcher(&self) -> &Arc<DirectoryWatcher> {
        &self.inner.watcher
    }

    /// Startup properties used to resolve directories.
    pub fn properties(&self) -> &StartupProperties {
        &self.inner.properties
    }

    /// The root configuration directory, if configured.
    pub fn root_dir(&self) -> Option<PathBuf> {
        root_directory(&self.inner.properties)
    }

    /// Resolved file path of every registration, in registration order.
    pub fn registration_paths(&self) -> Vec<PathBuf> {
        self.inner.registrations.iter().map(|r| r.path.clone()).collect()
    }
}

impl Drop for ReloadEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ReloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadEngine")
            .field("registrations", &self.inner.registrations.len())
            .field("loaded", &self.inner.registry.len())
            .field("running", &self.is_running())
            .finish()
    }
}
