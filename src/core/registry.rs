//! Thread-safe registry of the current configuration value per type.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased configuration value.
pub type ErasedConfig = Arc<dyn Any + Send + Sync>;

/// The live record for one configuration type.
///
/// `type_id`, `filename` and `prefix` are fixed at creation; the value is
/// swapped wholesale on every reload. A value handed out before a swap stays
/// valid and unchanged for whoever still holds it.
pub struct ConfigEntry {
    type_id: TypeId,
    type_name: &'static str,
    filename: String,
    prefix: String,
    value: ArcSwap<ErasedConfig>,
}

impl ConfigEntry {
    /// Create an entry for a typed value.
    pub fn new<T: Send + Sync + 'static>(filename: impl Into<String>, prefix: impl Into<String>, value: T) -> Self {
        Self::erased(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            filename,
            prefix,
            Arc::new(value),
        )
    }

    /// Create an entry from an already erased value.
    ///
    /// `type_id` must be the id of the concrete type inside `value`.
    pub(crate) fn erased(
        type_id: TypeId,
        type_name: &'static str,
        filename: impl Into<String>,
        prefix: impl Into<String>,
        value: ErasedConfig,
    ) -> Self {
        Self {
            type_id,
            type_name,
            filename: filename.into(),
            prefix: prefix.into(),
            value: ArcSwap::from_pointee(value),
        }
    }

    /// Id of the configuration type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the configuration type, for logging.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// File name the value was loaded from.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Prefix the value was read under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The current value as `T`, or `None` if `T` is not this entry's type.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.erased_value().downcast::<T>().ok()
    }

    /// The current value, type-erased.
    pub fn erased_value(&self) -> ErasedConfig {
        let current = self.value.load();
        Arc::clone(&**current)
    }

    fn replace(&self, value: ErasedConfig) {
        self.value.store(Arc::new(value));
    }
}

impl fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("type_name", &self.type_name)
            .field("filename", &self.filename)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Mapping from configuration type to its current [`ConfigEntry`].
///
/// Backed by a sharded map so independent types reload without blocking
/// each other; each entry's value sits behind its own `ArcSwap`.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::core::{ConfigEntry, ConfigRegistry};
///
/// #[derive(Debug, PartialEq)]
/// struct Limits { max_users: u32 }
///
/// let registry = ConfigRegistry::new();
/// registry.put(ConfigEntry::new("config.yml", "limits", Limits { max_users: 10 }));
///
/// assert_eq!(registry.get::<Limits>().unwrap().max_users, 10);
/// assert!(registry.is_filename_tracked("config.yml"));
/// ```
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    entries: DashMap<TypeId, Arc<ConfigEntry>>,
}

impl ConfigRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an entry, returning the entry now held for its type.
    ///
    /// When the type already has an entry, only its value is swapped; the
    /// existing entry keeps its identity, filename and prefix.
    pub fn put(&self, entry: ConfigEntry) -> Arc<ConfigEntry> {
        match self.entries.entry(entry.type_id) {
            Entry::Occupied(slot) => {
                let existing = Arc::clone(slot.get());
                drop(slot);
                existing.replace(entry.value.into_inner().as_ref().clone());
                existing
            }
            Entry::Vacant(slot) => Arc::clone(slot.insert(Arc::new(entry)).value()),
        }
    }

    /// Install a typed value.
    pub fn install<T: Send + Sync + 'static>(
        &self,
        filename: impl Into<String>,
        prefix: impl Into<String>,
        value: T,
    ) -> Arc<ConfigEntry> {
        self.put(ConfigEntry::new(filename, prefix, value))
    }

    /// Current value for `T`, if loaded.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entry(TypeId::of::<T>())?.value::<T>()
    }

    /// Entry for a type id.
    pub fn entry(&self, type_id: TypeId) -> Option<Arc<ConfigEntry>> {
        self.entries.get(&type_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `T` has a loaded entry.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Remove the entry for `T`.
    pub fn remove<T: 'static>(&self) -> Option<Arc<ConfigEntry>> {
        self.entries.remove(&TypeId::of::<T>()).map(|(_, entry)| entry)
    }

    /// Whether any entry was loaded from a file with this name.
    pub fn is_filename_tracked(&self, filename: &str) -> bool {
        self.entries.iter().any(|entry| entry.filename == filename)
    }

    /// Snapshot of every entry.
    pub fn all(&self) -> Vec<Arc<ConfigEntry>> {
        self.entries.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Number of loaded types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
