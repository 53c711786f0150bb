//! Config resolution: defaults, then `.mill/config.yaml`, then
//! `.mill/local.yaml`, then `MILL_*` environment variables.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
