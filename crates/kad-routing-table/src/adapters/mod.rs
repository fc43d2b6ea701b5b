//! # Adapters
//!
//! Concrete implementations of the driven ports that do not need a network:
//!
//! - `SystemTimeSource` - wall clock
//! - `StaticConfigProvider` - in-memory configuration
//! - `TomlConfigProvider` - configuration file (requires "config" feature)
//! - JSON snapshot codec
//!
//! RPC and lookup transports belong to the host.

mod config;
pub mod json;
mod time;

pub use config::StaticConfigProvider;
#[cfg(feature = "config")]
pub use config::{ConfigError, TomlConfigProvider};
pub use json::{read_snapshot, snapshot_from_json, snapshot_to_json, write_snapshot, SNAPSHOT_VERSION};
pub use time::SystemTimeSource;
