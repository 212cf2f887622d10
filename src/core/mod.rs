//! Core configuration management types.

mod builder;
pub(crate) mod descriptor;
mod engine;
mod live;
mod loader;
mod registry;

pub use builder::ReloadEngineBuilder;
pub use descriptor::{CONFIG_DIR_PLACEHOLDER, ConfigDescriptor, DEFAULT_FILENAME, Reloadable};
pub use engine::ReloadEngine;
pub use live::Live;
pub use loader::{ConfigLoader, LoadOutcome};
pub use registry::{ConfigEntry, ConfigRegistry, ErasedConfig};

pub(crate) use descriptor::normalize;
