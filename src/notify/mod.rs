//! Change detection and change notification.
//!
//! [`DirectoryWatcher`] turns OS notifications into debounced
//! [`FileChanged`] events; [`ChangeNotifier`] announces
//! [`ConfigurationChanged`] once the registry holds a new value.

mod debounce;
mod event;
pub mod subscriber;
pub mod watcher;

pub use debounce::Debouncer;
pub use event::{FileChangeKind, FileChanged};
pub use subscriber::{ChangeNotifier, ConfigurationChanged, SubscriptionHandle};
pub use watcher::{DirectoryWatcher, WatchSubscription};
