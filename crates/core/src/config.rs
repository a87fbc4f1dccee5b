use serde::Deserialize;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CRM_LISTS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    /// Name of the synthetic pseudo-list covering the whole contact store.
    #[serde(default = "default_reserved_list_name")]
    pub reserved_list_name: String,
    /// Owner scope used when a list definition does not name one.
    #[serde(default = "default_owner")]
    pub default_owner: String,
    /// Background recount period. `None` disables the refresh task.
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_reserved_list_name() -> String {
    "All Contacts".to_string()
}
fn default_owner() -> String {
    "default".to_string()
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            reserved_list_name: default_reserved_list_name(),
            default_owner: default_owner(),
            refresh_interval_secs: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CRM_LISTS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
