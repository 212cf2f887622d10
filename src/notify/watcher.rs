//! Recursive directory watching with debounced change events.

use super::debounce::Debouncer;
use super::event::{FileChangeKind, FileChanged, translate};
use crate::core::normalize;
use crate::error::{ConfigError, Result};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tracing::{debug, error, trace, warn};

/// One monitored directory.
#[derive(Debug, Clone)]
pub struct WatchSubscription {
    directory: PathBuf,
    since: SystemTime,
}

impl WatchSubscription {
    /// The monitored directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// When monitoring started.
    pub fn since(&self) -> SystemTime {
        self.since
    }
}

/// Watches a growing tree of directories and emits [`FileChanged`] events.
///
/// Each directory gets its own non-recursive OS watch. Subdirectories that
/// exist when a directory is monitored, and those created later, are
/// monitored as well. Raw events are consumed by a single loop in
/// [`run`](Self::run).
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_config::notify::DirectoryWatcher;
/// use std::sync::Arc;
/// use std::thread;
///
/// # fn example() -> reloadable_config::error::Result<()> {
/// let watcher = Arc::new(DirectoryWatcher::new()?);
/// watcher.monitor("/etc/app");
///
/// let looped = Arc::clone(&watcher);
/// let worker = thread::spawn(move || {
///     looped.run(|change| {
///         println!("{:?} {}", change.kind, change.path.display());
///         Ok(())
///     })
/// });
///
/// watcher.stop();
/// worker.join().unwrap()?;
/// # Ok(())
/// # }
/// ```
pub struct DirectoryWatcher {
    backend: Mutex<Option<RecommendedWatcher>>,
    subscriptions: DashMap<PathBuf, WatchSubscription>,
    debouncer: Debouncer,
    events: Receiver<notify::Result<Event>>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    running: AtomicBool,
}

impl DirectoryWatcher {
    /// Create a watcher with no monitored directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS notification backend cannot be created.
    pub fn new() -> Result<Self> {
        let (event_tx, events) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);

        let backend = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone only once the watcher itself is dropped
            let _ = event_tx.send(res);
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        Ok(Self {
            backend: Mutex::new(Some(backend)),
            subscriptions: DashMap::new(),
            debouncer: Debouncer::new(),
            events,
            stop_tx,
            stop_rx,
            running: AtomicBool::new(false),
        })
    }

    /// Monitor `directory` and, recursively, every subdirectory below it.
    ///
    /// Monitoring a directory twice is a no-op. Failures are logged and the
    /// failing directory is left unwatched.
    pub fn monitor(&self, directory: impl AsRef<Path>) {
        self.monitor_tree(directory.as_ref(), &mut Vec::new());
    }

    /// Monitor a directory tree, collecting the regular files already in the
    /// directories that were newly registered.
    fn monitor_tree(&self, directory: &Path, found: &mut Vec<PathBuf>) {
        let directory = normalize(directory);
        if !directory.is_dir() {
            warn!(path = %directory.display(), "Not a directory, not monitoring");
            return;
        }

        match self.subscriptions.entry(directory.clone()) {
            Entry::Occupied(_) => {
                trace!(path = %directory.display(), "Already monitored");
                return;
            }
            Entry::Vacant(slot) => {
                let registered = match self.backend.lock().as_mut() {
                    Some(backend) => backend.watch(&directory, RecursiveMode::NonRecursive),
                    None => {
                        debug!(path = %directory.display(), "Watcher stopped, not monitoring");
                        return;
                    }
                };
                if let Err(e) = registered {
                    warn!(path = %directory.display(), error = %e, "Failed to monitor directory");
                    return;
                }
                slot.insert(WatchSubscription {
                    directory: directory.clone(),
                    since: SystemTime::now(),
                });
                debug!(path = %directory.display(), "Monitoring directory");
            }
        }

        let children = match std::fs::read_dir(&directory) {
            Ok(children) => children,
            Err(e) => {
                warn!(path = %directory.display(), error = %e, "Failed to list directory");
                return;
            }
        };
        for child in children.flatten() {
            match child.file_type() {
                Ok(kind) if kind.is_dir() => self.monitor_tree(&child.path(), found),
                Ok(kind) if kind.is_file() => found.push(child.path()),
                _ => {}
            }
        }
    }

    /// Run the event loop until [`stop`](Self::stop) is called.
    ///
    /// Every accepted change is handed to `on_change`; an error from the
    /// callback ends the loop and is returned. Only one loop may run at a
    /// time.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::WatchError`] if a loop is already running.
    /// - [`ConfigError::EventOverflow`] if the backend dropped events.
    pub fn run<F>(&self, mut on_change: F) -> Result<()>
    where
        F: FnMut(FileChanged) -> Result<()>,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::WatchError("Watch loop is already running".to_string()));
        }
        let _running = RunningGuard(&self.running);

        loop {
            select! {
                recv(self.stop_rx) -> _ => {
                    debug!("Watch loop stopped");
                    return Ok(());
                }
                recv(self.events) -> message => match message {
                    Err(_) => {
                        debug!("Watch service closed");
                        return Ok(());
                    }
                    Ok(Err(e)) => warn!(error = %e, "Watch backend error"),
                    Ok(Ok(event)) => {
                        for change in self.accept(event) {
                            if change.kind == FileChangeKind::Overflow {
                                error!(path = %change.path.display(), "Change notifications overflowed");
                                return Err(ConfigError::EventOverflow(change.path));
                            }
                            on_change(change)?;
                        }
                    }
                },
            }
        }
    }

    /// Release every OS watch and unblock a running loop.
    ///
    /// Stopping twice is harmless.
    pub fn stop(&self) {
        let backend = self.backend.lock().take();
        if backend.is_some() {
            debug!(directories = self.subscriptions.len(), "Releasing directory watches");
        }
        drop(backend);
        // A full channel already holds a pending stop
        let _ = self.stop_tx.try_send(());
    }

    /// Whether `directory` is monitored.
    pub fn is_monitored(&self, directory: impl AsRef<Path>) -> bool {
        self.subscriptions.contains_key(&normalize(directory.as_ref()))
    }

    /// Number of monitored directories.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Monitored directories, sorted.
    pub fn monitored_directories(&self) -> Vec<PathBuf> {
        let mut directories: Vec<_> = self.subscriptions.iter().map(|s| s.key().clone()).collect();
        directories.sort();
        directories
    }

    /// Whether a loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn accept(&self, event: Event) -> Vec<FileChanged> {
        let mut accepted = Vec::new();
        for change in translate(event) {
            if change.kind == FileChangeKind::Overflow {
                accepted.push(change);
                continue;
            }

            let emit = self.debouncer.observe(&change.path);
            let mut discovered = Vec::new();
            match change.kind {
                FileChangeKind::Created if change.path.is_dir() => self.monitor_tree(&change.path, &mut discovered),
                FileChangeKind::Deleted => self.release(&change.path),
                _ => {}
            }

            if emit {
                trace!(path = %change.path.display(), kind = ?change.kind, "Change accepted");
                accepted.push(change);
            } else {
                trace!(path = %change.path.display(), "Duplicate change suppressed");
            }

            // Files written before the new directory's watch was in place
            // produce no events of their own
            for file in discovered {
                if self.debouncer.observe(&file) {
                    trace!(path = %file.display(), "File found in new directory");
                    accepted.push(FileChanged::new(file, FileChangeKind::Created));
                }
            }
        }
        accepted
    }

    /// Forget a deleted path, and its subscriptions if it was a directory.
    fn release(&self, path: &Path) {
        self.debouncer.forget(path);
        if !self.subscriptions.contains_key(path) {
            return;
        }

        self.debouncer.forget_tree(path);
        let mut released = Vec::new();
        self.subscriptions.retain(|directory, _| {
            let gone = directory.starts_with(path);
            if gone {
                released.push(directory.clone());
            }
            !gone
        });

        if let Some(backend) = self.backend.lock().as_mut() {
            for directory in &released {
                // The OS usually drops the watch itself when the directory goes
                if let Err(e) = backend.unwatch(directory) {
                    trace!(path = %directory.display(), error = %e, "Unwatch after delete");
                }
            }
        }
        debug!(path = %path.display(), released = released.len(), "Directory removed");
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("subscriptions", &self.subscriptions.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
