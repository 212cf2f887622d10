//! Integration tests for basic configuration loading.

use reloadable_config::core::{ConfigLoader, LoadOutcome};
use reloadable_config::prelude::*;
use reloadable_config::sources::StartupProperties;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct ServerConfig {
    port: u16,
    host: String,
}

impl Reloadable for ServerConfig {}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
struct DatabaseConfig {
    url: String,
    max_connections: u32,
    #[serde(skip)]
    summary: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/db".to_string(),
            max_connections: 5,
            summary: String::new(),
        }
    }
}

impl Reloadable for DatabaseConfig {
    fn initialize(&mut self) {
        self.summary = format!("{} ({})", self.url, self.max_connections);
    }
}

const CONFIG: &str = r#"
server:
  port: 8080
  host: localhost
database:
  url: postgres://db.internal/app
  max-connections: 10
"#;

fn write_config(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

#[test]
fn test_load_prefixes_from_one_file() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", CONFIG);

    let engine = ReloadEngine::builder()
        .with_root_dir(dir.path())
        .register::<ServerConfig>(ConfigDescriptor::new("server"))
        .register::<DatabaseConfig>(ConfigDescriptor::new("database"))
        .build()
        .unwrap();
    engine.start().unwrap();

    let server = engine.get::<ServerConfig>().unwrap();
    assert_eq!(server.port, 8080);
    assert_eq!(server.host, "localhost");

    let database = engine.get::<DatabaseConfig>().unwrap();
    assert_eq!(database.max_connections, 10);
    assert_eq!(database.summary, "postgres://db.internal/app (10)");

    engine.stop();
}

#[test]
fn test_missing_prefix_and_missing_file_leave_types_unloaded() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", "server:\n  port: 1\n  host: a\n");

    let engine = ReloadEngine::builder()
        .with_root_dir(dir.path())
        .register::<ServerConfig>(ConfigDescriptor::new("server").with_filename("absent.yml"))
        .register::<DatabaseConfig>(ConfigDescriptor::new("database"))
        .build()
        .unwrap();
    engine.start().unwrap();

    assert!(engine.get::<ServerConfig>().is_none());
    assert!(engine.get::<DatabaseConfig>().is_none());
    assert!(engine.is_running());
}

#[test]
fn test_invalid_file_does_not_fail_start() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", "server:\n  port: not-a-port\n  host: a\n");

    let engine = ReloadEngine::builder()
        .with_root_dir(dir.path())
        .register::<ServerConfig>(ConfigDescriptor::new("server"))
        .build()
        .unwrap();

    engine.start().unwrap();
    assert!(engine.get::<ServerConfig>().is_none());
    assert!(matches!(engine.reload_all(), Err(ConfigError::ParseError { .. })));
}

#[test]
fn test_placeholder_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("tenants")).unwrap();
    fs::write(dir.path().join("tenants").join("db.json"), r#"{"database": {"maxConnections": 42}}"#).unwrap();

    let properties = StartupProperties::builder()
        .with_override("application.config.dir", dir.path().to_string_lossy())
        .build()
        .unwrap();

    let engine = ReloadEngine::builder()
        .with_properties(properties)
        .register::<DatabaseConfig>(
            ConfigDescriptor::new("database")
                .in_directory("${application.config.dir}/tenants")
                .with_filename("db.json"),
        )
        .build()
        .unwrap();
    engine.start().unwrap();

    let database = engine.get::<DatabaseConfig>().unwrap();
    assert_eq!(database.max_connections, 42);
    assert_eq!(database.url, "postgres://localhost/db");
}

#[test]
fn test_defaults_overlay() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", "database:\n  url: postgres://override/db\n");

    let defaults = DatabaseConfig {
        max_connections: 64,
        ..DatabaseConfig::default()
    };
    let engine = ReloadEngine::builder()
        .with_root_dir(dir.path())
        .register_with_defaults::<DatabaseConfig>(ConfigDescriptor::new("database"), defaults)
        .build()
        .unwrap();
    engine.start().unwrap();

    let database = engine.get::<DatabaseConfig>().unwrap();
    assert_eq!(database.url, "postgres://override/db");
    assert_eq!(database.max_connections, 64);
    assert_eq!(database.summary, "postgres://override/db (64)");
}

#[test]
fn test_loader_standalone() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", CONFIG);
    let path = dir.path().join("config.yml");

    let loader = ConfigLoader::new();
    let server = loader.load::<ServerConfig>(&path, "config.yml", "server").unwrap();
    assert_eq!(server.into_value().unwrap().port, 8080);

    let missing = loader.load::<ServerConfig>(&path, "config.yml", "metrics").unwrap();
    assert!(matches!(missing, LoadOutcome::NotConfigured));
}

#[test]
fn test_reload_publishes_to_prefix_subscribers() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", CONFIG);

    let engine = ReloadEngine::builder()
        .with_root_dir(dir.path())
        .register::<ServerConfig>(ConfigDescriptor::new("server"))
        .register::<DatabaseConfig>(ConfigDescriptor::new("database"))
        .build()
        .unwrap();

    let server_events = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&server_events);
    let _handle = engine.notifier().subscribe("server", move |event| {
        assert!(event.is::<ServerConfig>());
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    engine.start().unwrap();
    assert_eq!(server_events.load(Ordering::SeqCst), 1);

    // Replacing the file and reloading by path announces again
    write_config(&dir, "config.yml", &CONFIG.replace("8080", "9090"));
    assert_eq!(engine.reload_path(dir.path().join("config.yml")).unwrap(), 2);
    assert_eq!(server_events.load(Ordering::SeqCst), 2);
    assert_eq!(engine.get::<ServerConfig>().unwrap().port, 9090);
}

#[test]
fn test_live_handle_sees_replacements() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "config.yml", CONFIG);

    let engine = ReloadEngine::builder()
        .with_root_dir(dir.path())
        .register::<ServerConfig>(ConfigDescriptor::new("server"))
        .build()
        .unwrap();

    let live = engine.live::<ServerConfig>();
    assert!(!live.is_loaded());
    engine.start().unwrap();

    let cloned = live.clone();
    assert_eq!(live.map_or(0, |s| s.port), 8080);

    write_config(&dir, "config.yml", &CONFIG.replace("8080", "7070"));
    engine.reload_all().unwrap();
    assert_eq!(cloned.with(|s| s.port), Some(7070));
}
