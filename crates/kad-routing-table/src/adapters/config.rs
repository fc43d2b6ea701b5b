use crate::domain::{RoutingConfig, SocketAddr};
use crate::ports::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Hardcoded config for testing/development
// ============================================================================

/// Static configuration provider.
///
/// Useful for tests and embedding. To read a file, use `TomlConfigProvider`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    seed_addresses: Vec<SocketAddr>,
    config: RoutingConfig,
}

impl StaticConfigProvider {
    /// Default routing parameters and no seed addresses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_seed_addresses(mut self, addrs: Vec<SocketAddr>) -> Self {
        self.seed_addresses = addrs;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RoutingConfig) -> Self {
        self.config = config;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn get_seed_addresses(&self) -> Vec<SocketAddr> {
        self.seed_addresses.clone()
    }

    fn get_routing_config(&self) -> RoutingConfig {
        self.config.clone()
    }
}

// ============================================================================
// TomlConfigProvider - File-based config (requires "config" feature)
// ============================================================================

#[cfg(feature = "config")]
mod toml_config {
    use std::fs;
    use std::path::Path;

    use serde::Deserialize;
    use thiserror::Error;
    use tracing::warn;

    use super::*;
    use crate::domain::RoutingError;

    #[derive(Debug, Deserialize)]
    struct ConfigFile {
        #[serde(default)]
        seeds: SeedsConfig,
        #[serde(default)]
        routing: RoutingConfig,
    }

    #[derive(Debug, Deserialize, Default)]
    struct SeedsConfig {
        #[serde(default)]
        addresses: Vec<String>,
    }

    /// TOML-based configuration provider.
    ///
    /// Missing keys take their default value. Seed addresses that do not
    /// parse are skipped with a warning.
    ///
    /// # Config File Format
    ///
    /// ```toml
    /// [seeds]
    /// addresses = [
    ///     "192.168.1.100:6346",
    ///     "10.0.0.1:6346"
    /// ]
    ///
    /// [routing]
    /// k = 20
    /// role = "passive"
    /// closest_subtree_splits = 4
    /// max_in_net_per_bucket = 2
    /// alive_period_secs = 300
    /// ```
    #[derive(Debug, Clone)]
    pub struct TomlConfigProvider {
        seed_addresses: Vec<SocketAddr>,
        config: RoutingConfig,
    }

    impl TomlConfigProvider {
        /// Load configuration from a TOML file.
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read, parsed or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                error: e.to_string(),
            })?;

            Self::parse(&content)
        }

        /// Parse configuration from a TOML string.
        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            file.routing.validate()?;

            let seed_addresses = file
                .seeds
                .addresses
                .iter()
                .filter_map(|s| {
                    let parsed = s.parse::<std::net::SocketAddr>().ok().map(SocketAddr::from);
                    if parsed.is_none() {
                        warn!(address = %s, "ignoring malformed seed address");
                    }
                    parsed
                })
                .collect();

            Ok(Self {
                seed_addresses,
                config: file.routing,
            })
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn get_seed_addresses(&self) -> Vec<SocketAddr> {
            self.seed_addresses.clone()
        }

        fn get_routing_config(&self) -> RoutingConfig {
            self.config.clone()
        }
    }

    /// Errors that can occur during config loading.
    #[derive(Debug, Clone, Error)]
    pub enum ConfigError {
        #[error("failed to read {path}: {error}")]
        Io { path: String, error: String },

        #[error("failed to parse config: {0}")]
        Parse(String),

        #[error(transparent)]
        Invalid(#[from] RoutingError),
    }
}

#[cfg(feature = "config")]
pub use toml_config::{ConfigError, TomlConfigProvider};
