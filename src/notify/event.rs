//! Canonical file change events.

use notify::event::{EventKind, ModifyKind, RenameMode};
use std::path::PathBuf;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    /// The path appeared (created or renamed into place).
    Created,
    /// The contents or metadata changed.
    Modified,
    /// The path disappeared (removed or renamed away).
    Deleted,
    /// The backend lost events and the watch tree is no longer reliable.
    Overflow,
}

/// A de-duplicated change to one absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChanged {
    /// Absolute path of the changed file or directory.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileChangeKind,
}

impl FileChanged {
    /// Create an event.
    pub fn new(path: impl Into<PathBuf>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Turn one raw backend event into canonical events, one per path.
pub(crate) fn translate(event: notify::Event) -> Vec<FileChanged> {
    if event.need_rescan() {
        let path = event.paths.into_iter().next().unwrap_or_default();
        return vec![FileChanged::new(path, FileChangeKind::Overflow)];
    }

    match event.kind {
        // Both paths in one event: old name first, new name second
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut changes = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                changes.push(FileChanged::new(from, FileChangeKind::Deleted));
            }
            if let Some(to) = paths.next() {
                changes.push(FileChanged::new(to, FileChangeKind::Created));
            }
            changes
        }
        kind => match classify(&kind) {
            Some(kind) => event
                .paths
                .into_iter()
                .map(|path| FileChanged::new(path, kind))
                .collect(),
            None => Vec::new(),
        },
    }
}

fn classify(kind: &EventKind) -> Option<FileChangeKind> {
    match kind {
        EventKind::Create(_) => Some(FileChangeKind::Created),
        EventKind::Remove(_) => Some(FileChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FileChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(FileChangeKind::Created),
        EventKind::Modify(_) | EventKind::Any => Some(FileChangeKind::Modified),
        EventKind::Access(_) | EventKind::Other => None,
    }
}
