//! Configuration for dspaced

use dspace_controller::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Controller runtime settings, shared by the sync and policy controllers
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Mount graph discovery at startup
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Resource store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Rebuild the mount graph from the store before controllers start
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `group/version` pairs to scan; empty scans every kind
    #[serde(default)]
    pub api_groups: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_groups: Vec::new(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file of documents loaded into the store at startup
    #[serde(default)]
    pub seed_path: Option<PathBuf>,

    /// Buffered change events per kind
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed_path: None,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `DSPACE_` variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use a double underscore: DSPACE_CONTROLLER__MAX_REQUEUES
        builder = builder.add_source(
            config::Environment::with_prefix("DSPACE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("discovery.api_groups")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
