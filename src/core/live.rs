//! Long-lived handles that always read the registry's current value.

use crate::core::ConfigRegistry;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A stable handle to the current configuration of type `T`.
///
/// Every call is forwarded to the registry at call time, so a handle
/// obtained once at startup keeps tracking hot-swaps. Two calls on the same
/// handle may observe different values if a reload happened in between;
/// each call sees one complete value.
///
/// While `T` has not been loaded, reads return `None` instead of failing.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::core::{ConfigRegistry, Live};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct ServerConfig { port: u16 }
///
/// let registry = Arc::new(ConfigRegistry::new());
/// let server: Live<ServerConfig> = Live::new(Arc::clone(&registry));
/// assert!(server.get().is_none());
///
/// registry.install("config.yml", "server", ServerConfig { port: 8080 });
/// assert_eq!(server.with(|cfg| cfg.port), Some(8080));
///
/// registry.install("config.yml", "server", ServerConfig { port: 9090 });
/// assert_eq!(server.with(|cfg| cfg.port), Some(9090));
/// ```
pub struct Live<T> {
    registry: Arc<ConfigRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Live<T> {
    /// Create a handle reading `T` from `registry`.
    pub fn new(registry: Arc<ConfigRegistry>) -> Self {
        Self {
            registry,
            _marker: PhantomData,
        }
    }

    /// Get a reference-counted handle to the current value.
    ///
    /// The returned `Arc` is a snapshot: it does not change if a reload
    /// happens while it is held.
    pub fn get(&self) -> Option<Arc<T>> {
        self.registry.get::<T>()
    }

    /// Run `f` against the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.get().map(|current| f(&current))
    }

    /// Run `f` against the current value, or return `default` when `T` is
    /// not loaded.
    pub fn map_or<R>(&self, default: R, f: impl FnOnce(&T) -> R) -> R {
        self.with(f).unwrap_or(default)
    }

    /// Whether `T` currently has a value.
    pub fn is_loaded(&self) -> bool {
        self.registry.contains::<T>()
    }
}

impl<T> Clone for Live<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Live<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Live")
            .field("type_name", &std::any::type_name::<T>())
            .finish()
    }
}
