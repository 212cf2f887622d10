//! Timestamp-based suppression of duplicate change notifications.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Collapses back-to-back notifications for the same write.
///
/// One record per path holds the last time the path was seen, in epoch
/// milliseconds, and the file's length at that moment. A notification
/// passes when the file's modification time is newer than that record, is
/// `0` (deleted or unreadable), or the length changed. The length check
/// catches an in-place rewrite whose truncate and write land in the same
/// millisecond.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::notify::Debouncer;
/// use std::path::Path;
///
/// let debouncer = Debouncer::new();
/// let path = Path::new("/etc/app/config.yml");
///
/// assert!(debouncer.accept(path, 1_000, 64, 1_005));
/// // Same write reported again
/// assert!(!debouncer.accept(path, 1_000, 64, 1_006));
/// // Same millisecond, different content length
/// assert!(debouncer.accept(path, 1_000, 80, 1_006));
/// // A later write
/// assert!(debouncer.accept(path, 2_000, 80, 2_001));
/// ```
#[derive(Debug, Default)]
pub struct Debouncer {
    records: DashMap<PathBuf, Seen>,
}

#[derive(Debug, Clone, Copy)]
struct Seen {
    at_ms: u64,
    len: u64,
}

impl Debouncer {
    /// Create an empty debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a notification for `path` should be emitted, and
    /// record it.
    pub fn accept(&self, path: &Path, modified_ms: u64, len: u64, now_ms: u64) -> bool {
        let seen = Seen {
            at_ms: now_ms.max(modified_ms),
            len,
        };
        match self.records.entry(path.to_path_buf()) {
            Entry::Occupied(mut record) => {
                let previous = *record.get();
                let emit = modified_ms == 0 || modified_ms > previous.at_ms || len != previous.len;
                record.insert(seen);
                emit
            }
            Entry::Vacant(record) => {
                record.insert(seen);
                true
            }
        }
    }

    /// Check `path` against the clock and its on-disk modification time
    /// and length.
    pub fn observe(&self, path: &Path) -> bool {
        let (modified_ms, len) = file_stamp(path);
        self.accept(path, modified_ms, len, now_millis())
    }

    /// Drop the record for `path`.
    pub fn forget(&self, path: &Path) {
        self.records.remove(path);
    }

    /// Drop the records for `path` and everything below it.
    pub fn forget_tree(&self, path: &Path) {
        self.records.retain(|recorded, _| !recorded.starts_with(path));
    }

    /// Number of paths with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no path has a record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Modification time of `path` in epoch milliseconds and its length; `(0, 0)`
/// if unavailable.
pub(crate) fn file_stamp(path: &Path) -> (u64, u64) {
    match std::fs::metadata(path) {
        Ok(meta) => (meta.modified().map(epoch_millis).unwrap_or(0), meta.len()),
        Err(_) => (0, 0),
    }
}

pub(crate) fn now_millis() -> u64 {
    epoch_millis(SystemTime::now())
}

fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
