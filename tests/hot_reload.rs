//! End-to-end tests driving reloads through real file system events.

use reloadable_config::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct SecurityConfig {
    login_attempts: u32,
    domain_name: String,
}

impl Reloadable for SecurityConfig {}

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct TenantConfig {
    name: String,
}

impl Reloadable for TenantConfig {}

/// A watched `conf/` directory plus a sibling staging area for atomic writes.
struct Workspace {
    _root: TempDir,
    conf: PathBuf,
    staging: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let conf = root.path().join("conf");
        let staging = root.path().join("staging");
        fs::create_dir(&conf).unwrap();
        fs::create_dir(&staging).unwrap();
        Self {
            conf: conf.canonicalize().unwrap(),
            staging,
            _root: root,
        }
    }

    /// Replace `relative` under `conf/` in one rename.
    fn publish(&self, relative: &str, contents: &str) {
        // Keep modification times strictly increasing between writes
        thread::sleep(Duration::from_millis(20));
        let staged = self.staging.join("pending");
        fs::write(&staged, contents).unwrap();
        fs::rename(&staged, self.conf.join(relative)).unwrap();
    }
}

fn security(attempts: u32) -> String {
    format!("security:\n  login-attempts: {}\n  domain-name: example.org\n", attempts)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

fn engine_for(dir: &Path) -> ReloadEngine {
    ReloadEngine::builder()
        .with_root_dir(dir)
        .register::<SecurityConfig>(ConfigDescriptor::new("security"))
        .register::<TenantConfig>(ConfigDescriptor::new("tenant").in_directory("${application.config.dir}/tenants"))
        .build()
        .unwrap()
}

#[test]
fn test_file_change_reloads_and_notifies() {
    let ws = Workspace::new();
    ws.publish("config.yml", &security(3));

    let engine = engine_for(&ws.conf);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let _handle = engine.notifier().subscribe("security", move |event| {
        let value = event.value::<SecurityConfig>().ok_or("wrong type")?;
        assert!(value.login_attempts > 0);
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    engine.start().unwrap();

    let live = engine.live::<SecurityConfig>();
    assert_eq!(live.with(|s| s.login_attempts), Some(3));

    ws.publish("config.yml", &security(5));
    assert!(wait_until(|| live.with(|s| s.login_attempts) == Some(5)));
    assert!(notified.load(Ordering::SeqCst) >= 2);

    engine.stop();
    assert!(!engine.is_running());
}

#[test]
fn test_invalid_edit_keeps_last_good_value() {
    let ws = Workspace::new();
    ws.publish("config.yml", &security(3));

    let engine = engine_for(&ws.conf);
    engine.start().unwrap();
    let live = engine.live::<SecurityConfig>();

    ws.publish("config.yml", "security:\n  login-attempts: many\n  domain-name: example.org\n");
    // Give the watcher time to see and reject the edit
    thread::sleep(Duration::from_millis(300));
    assert_eq!(live.with(|s| s.login_attempts), Some(3));

    ws.publish("config.yml", &security(8));
    assert!(wait_until(|| live.with(|s| s.login_attempts) == Some(8)));
}

#[test]
fn test_file_created_after_start_is_loaded() {
    let ws = Workspace::new();
    let engine = engine_for(&ws.conf);
    engine.start().unwrap();
    assert!(engine.get::<SecurityConfig>().is_none());

    ws.publish("config.yml", &security(4));
    assert!(wait_until(|| engine.get::<SecurityConfig>().is_some()));
    assert_eq!(engine.get::<SecurityConfig>().unwrap().login_attempts, 4);
}

#[test]
fn test_new_subdirectory_is_watched() {
    let ws = Workspace::new();
    let engine = engine_for(&ws.conf);
    engine.start().unwrap();

    let tenants = ws.conf.join("tenants");
    fs::create_dir(&tenants).unwrap();
    assert!(wait_until(|| engine.watcher().is_monitored(&tenants)));

    ws.publish("tenants/config.yml", "tenant:\n  name: acme\n");
    assert!(wait_until(|| engine.get::<TenantConfig>().is_some_and(|t| t.name == "acme")));
}

#[test]
fn test_deleted_file_keeps_value() {
    let ws = Workspace::new();
    ws.publish("config.yml", &security(6));

    let engine = engine_for(&ws.conf);
    engine.start().unwrap();

    fs::remove_file(ws.conf.join("config.yml")).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(engine.get::<SecurityConfig>().unwrap().login_attempts, 6);
    assert!(engine.is_running());

    // Recreating the file after a delete is picked up again
    ws.publish("config.yml", &security(7));
    assert!(wait_until(|| engine.get::<SecurityConfig>().is_some_and(|s| s.login_attempts == 7)));
}

#[test]
fn test_no_reloads_after_stop() {
    let ws = Workspace::new();
    ws.publish("config.yml", &security(1));

    let engine = engine_for(&ws.conf);
    engine.start().unwrap();
    engine.stop();
    assert!(!engine.is_running());

    ws.publish("config.yml", &security(2));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(engine.get::<SecurityConfig>().unwrap().login_attempts, 1);
}

#[test]
fn test_file_written_right_after_mkdir_is_loaded() {
    let ws = Workspace::new();
    let engine = engine_for(&ws.conf);
    engine.start().unwrap();

    // No wait between creating the directory and writing into it
    let tenants = ws.conf.join("tenants");
    fs::create_dir(&tenants).unwrap();
    fs::write(tenants.join("config.yml"), "tenant:\n  name: initech\n").unwrap();

    assert!(wait_until(|| engine.get::<TenantConfig>().is_some_and(|t| t.name == "initech")));
}

#[cfg(unix)]
#[test]
fn test_symlinked_root_loads_late_subdirectory() {
    let ws = Workspace::new();
    let link = ws.staging.join("link");
    std::os::unix::fs::symlink(&ws.conf, &link).unwrap();

    let engine = engine_for(&link);
    engine.start().unwrap();

    let tenants = link.join("tenants");
    fs::create_dir(&tenants).unwrap();
    assert!(wait_until(|| engine.watcher().is_monitored(&tenants)));
    ws.publish("tenants/config.yml", "tenant:\n  name: globex\n");

    assert!(wait_until(|| engine.get::<TenantConfig>().is_some_and(|t| t.name == "globex")));
}

#[test]
fn test_in_place_writes_are_all_loaded() {
    let ws = Workspace::new();
    let path = ws.conf.join("config.yml");
    fs::write(&path, security(1)).unwrap();

    let engine = engine_for(&ws.conf);
    engine.start().unwrap();
    let live = engine.live::<SecurityConfig>();

    for attempts in 2..=20 {
        thread::sleep(Duration::from_millis(30));
        fs::write(&path, security(attempts)).unwrap();
        assert!(
            wait_until(|| live.with(|s| s.login_attempts) == Some(attempts)),
            "write {} was not loaded",
            attempts
        );
    }
}
