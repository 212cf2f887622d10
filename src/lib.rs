//! # reloadable-config
//!
//! Live configuration for long-running services: typed configuration
//! objects that reload themselves when their files change on disk.
//!
//! ## Overview
//!
//! `reloadable-config` combines:
//! - A recursive directory watcher with per-file debouncing
//! - A loader that binds a prefix of a JSON, YAML, TOML or properties file
//!   onto a typed struct
//! - A registry holding one live value per configuration type, swapped
//!   atomically with `arc-swap`
//! - A change notifier for per-prefix subscribers
//! - Optional scheduled jobs whose triggers follow the configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reloadable_config::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, Default)]
//! #[serde(default)]
//! struct SecurityConfig {
//!     login_attempts: u32,
//!     session_timeout: u64,
//! }
//!
//! impl Reloadable for SecurityConfig {}
//!
//! # fn example() -> Result<()> {
//! let engine = ReloadEngine::builder()
//!     .with_root_dir("/etc/app")
//!     .register::<SecurityConfig>(ConfigDescriptor::new("security"))
//!     .build()?;
//! engine.start()?;
//!
//! // Always the latest successfully loaded value
//! let security = engine.live::<SecurityConfig>();
//! if let Some(cfg) = security.get() {
//!     println!("login attempts: {}", cfg.login_attempts);
//! }
//!
//! let _handle = engine.notifier().subscribe("security", |event| {
//!     println!("reloaded {}", event.type_name());
//!     Ok(())
//! });
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml` (default): YAML files
//! - `toml`: TOML files
//! - `scheduler` (default): [`scheduled`] jobs driven by the `scheduled` prefix

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "scheduler")]
pub mod scheduled;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ConfigDescriptor, ConfigRegistry, Live, ReloadEngine, ReloadEngineBuilder, Reloadable};
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{ChangeNotifier, ConfigurationChanged, SubscriptionHandle};
    pub use crate::sources::StartupProperties;

    #[cfg(feature = "scheduler")]
    pub use crate::scheduled::{ScheduledJob, ScheduledTaskConfig, ScheduledTaskReconfigurer, TaskDefinition};
}
