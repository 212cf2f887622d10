//! Prefix-filtered notifications for configuration changes.

use crate::core::{ConfigEntry, ErasedConfig};
use crate::error::BoxError;
use parking_lot::RwLock;
use std::any::TypeId;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{error, trace};

/// Announces that the registry holds a new value for a type.
#[derive(Clone)]
pub struct ConfigurationChanged {
    prefix: String,
    type_id: TypeId,
    type_name: &'static str,
    value: ErasedConfig,
}

impl ConfigurationChanged {
    /// Create an event for a new value of `T`.
    pub fn new<T: Send + Sync + 'static>(prefix: impl Into<String>, value: Arc<T>) -> Self {
        Self {
            prefix: prefix.into(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value,
        }
    }

    /// Event for the value currently held by `entry`.
    pub fn from_entry(entry: &ConfigEntry) -> Self {
        Self {
            prefix: entry.prefix().to_string(),
            type_id: entry.type_id(),
            type_name: entry.type_name(),
            value: entry.erased_value(),
        }
    }

    /// Prefix of the changed configuration.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Id of the changed type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the changed type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the change is for `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// The new value as `T`.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for ConfigurationChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationChanged")
            .field("prefix", &self.prefix)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

type Handler = Arc<dyn Fn(&ConfigurationChanged) -> Result<(), BoxError> + Send + Sync>;

struct Subscriber {
    id: usize,
    prefix: String,
    handler: Handler,
}

/// Internal notifier state.
struct NotifierInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicUsize,
}

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed before `drop`
/// returns.
pub struct SubscriptionHandle {
    id: usize,
    prefix: String,
    notifier: Weak<NotifierInner>,
}

impl SubscriptionHandle {
    /// Prefix this subscription listens to.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Keep the subscription for as long as the notifier lives.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner.subscribers.write().retain(|subscriber| subscriber.id != self.id);
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Synchronous publish/subscribe bus for [`ConfigurationChanged`].
///
/// Subscribers register for one prefix (exact match). Publishing calls every
/// matching handler in registration order on the publishing thread. A
/// handler that fails or panics is logged and does not stop delivery to
/// the rest.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::notify::{ChangeNotifier, ConfigurationChanged};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Security { domain_name: String }
///
/// let notifier = ChangeNotifier::new();
/// let handle = notifier.subscribe("security", |event| {
///     if let Some(security) = event.value::<Security>() {
///         println!("security now serves {}", security.domain_name);
///     }
///     Ok(())
/// });
///
/// let event = ConfigurationChanged::new("security", Arc::new(Security { domain_name: "a.org".into() }));
/// assert_eq!(notifier.publish(&event), 1);
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// assert_eq!(notifier.publish(&event), 0);
/// ```
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to changes published under `prefix`.
    pub fn subscribe<F>(&self, prefix: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&ConfigurationChanged) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(Subscriber {
            id,
            prefix: prefix.clone(),
            handler: Arc::new(handler),
        });
        trace!(prefix = %prefix, id, "Subscribed to configuration changes");

        SubscriptionHandle {
            id,
            prefix,
            notifier: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every subscriber of its prefix.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn publish(&self, event: &ConfigurationChanged) -> usize {
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|subscriber| subscriber.prefix == event.prefix)
            .map(|subscriber| Arc::clone(&subscriber.handler))
            .collect();

        trace!(prefix = %event.prefix, handlers = handlers.len(), "Publishing configuration change");

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    error!(prefix = %event.prefix, type_name = event.type_name, error = %e, "Configuration change handler failed");
                }
                Err(_) => {
                    error!(prefix = %event.prefix, type_name = event.type_name, "Configuration change handler panicked");
                }
            }
        }
        delivered
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
