//! Configuration sources: file formats, value trees and startup properties.

mod file;
mod format;
mod properties;
pub(crate) mod tree;

pub use file::ConfigFile;
pub use format::{ConfigFormat, FieldNaming};
pub use properties::{CONFIG_DIR_PROPERTY, StartupProperties, StartupPropertiesBuilder};
