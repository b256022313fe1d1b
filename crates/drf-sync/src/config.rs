//! # Inventory Configuration
//!
//! Configuration for one inventory source.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DRF_INVENTORY_BASE_URL=https://drf.example.com                     │
//! │     DRF_INVENTORY_CUSTOMER_ID=42                                       │
//! │     DRF_INVENTORY_CACHE=true                                           │
//! │     DRF_INVENTORY_STRICT=true                                          │
//! │     DRF_INVENTORY_TOKEN_FILE=/run/drf/token                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/drf-inventory/inventory.toml (Linux)                     │
//! │     ~/Library/Application Support/drf-inventory/inventory.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! plugin = "django_drf"
//! customer_id = 42
//! base_url = "https://drf.example.com"
//! strict = false
//! # Ansible leaves names alone by default; this tool sanitizes unless told not to.
//! sanitize_group_names = true
//! cache = true
//! cache_plugin = "jsonfile"
//! cache_timeout = 3600
//!
//! [compose]
//! env = "'prod'"
//!
//! [groups]
//! linux = "operating_system.name == 'linux'"
//!
//! [[keyed_groups]]
//! key = "description"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use drf_core::{ComposeRules, PLUGIN_NAME};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// File name of the persisted token in the user's home directory.
pub const TOKEN_FILE_NAME: &str = ".django_drf-tokenfile";

// =============================================================================
// Cache Plugin
// =============================================================================

/// Which cache backend stores fetched payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePlugin {
    /// In-process map, gone when the run ends.
    #[default]
    Memory,

    /// One JSON document per key under `cache_connection`.
    Jsonfile,
}

impl std::fmt::Display for CachePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePlugin::Memory => write!(f, "memory"),
            CachePlugin::Jsonfile => write!(f, "jsonfile"),
        }
    }
}

impl std::str::FromStr for CachePlugin {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CachePlugin::Memory),
            "jsonfile" | "json" => Ok(CachePlugin::Jsonfile),
            other => Err(SyncError::Config(format!(
                "Unknown cache plugin: '{}'. Valid options: memory, jsonfile",
                other
            ))),
        }
    }
}

// =============================================================================
// Inventory Configuration
// =============================================================================

/// Complete configuration of one `django_drf` inventory source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Must be `django_drf`.
    pub plugin: String,

    /// Customer whose servers make up the inventory.
    /// Zero means unset; validation rejects it.
    #[serde(default)]
    pub customer_id: i64,

    /// API root without the `/api` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// compose / groups / keyed_groups / leading_separator / strict
    #[serde(flatten)]
    pub rules: ComposeRules,

    /// Enable the response cache.
    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub cache_plugin: CachePlugin,

    /// Cache entry lifetime in seconds. 0 keeps entries forever.
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout: u64,

    /// Directory for the `jsonfile` backend.
    #[serde(default)]
    pub cache_connection: Option<PathBuf>,

    /// Verify the API's TLS certificate.
    #[serde(default)]
    pub validate_certs: bool,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Token file location. Defaults to `~/.django_drf-tokenfile`.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Where this configuration was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://django_drf.local".to_string()
}

fn default_cache_timeout() -> u64 {
    3600
}

fn default_timeout() -> u64 {
    30
}

impl InventoryConfig {
    /// Creates a config for `customer_id` with every other field defaulted.
    pub fn new(customer_id: i64) -> Self {
        InventoryConfig {
            plugin: PLUGIN_NAME.to_string(),
            customer_id,
            base_url: default_base_url(),
            rules: ComposeRules::default(),
            cache: false,
            cache_plugin: CachePlugin::default(),
            cache_timeout: default_cache_timeout(),
            cache_connection: None,
            validate_certs: false,
            timeout_secs: default_timeout(),
            token_file: None,
            source: None,
        }
    }

    /// Loads configuration from file and environment.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (inventory.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigLoad("No config path available".into()))?;

        if !path.exists() {
            return Err(SyncError::ConfigLoad(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        info!(?path, "Loading inventory config from file");
        let contents = std::fs::read_to_string(&path)?;
        let mut config = Self::from_toml_str(&contents)?;
        config.source = Some(path);

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.plugin != PLUGIN_NAME {
            return Err(SyncError::Config(format!(
                "plugin must be '{}', got '{}'",
                PLUGIN_NAME, self.plugin
            )));
        }

        if self.customer_id <= 0 {
            return Err(SyncError::Config(
                "customer_id is required and must be greater than 0".into(),
            ));
        }

        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(SyncError::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        self.rules.validate().map_err(SyncError::Config)
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable source.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DRF_INVENTORY_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.base_url = url;
        }

        if let Some(id) = lookup("DRF_INVENTORY_CUSTOMER_ID") {
            match id.parse::<i64>() {
                Ok(id) => self.customer_id = id,
                Err(_) => warn!(value = %id, "Ignoring non-numeric DRF_INVENTORY_CUSTOMER_ID"),
            }
        }

        if let Some(cache) = lookup("DRF_INVENTORY_CACHE") {
            match parse_flag(&cache) {
                Some(flag) => self.cache = flag,
                None => warn!(value = %cache, "Ignoring invalid DRF_INVENTORY_CACHE"),
            }
        }

        if let Some(strict) = lookup("DRF_INVENTORY_STRICT") {
            match parse_flag(&strict) {
                Some(flag) => self.rules.strict = flag,
                None => warn!(value = %strict, "Ignoring invalid DRF_INVENTORY_STRICT"),
            }
        }

        if let Some(path) = lookup("DRF_INVENTORY_TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "drf-inventory")
            .map(|dirs| dirs.config_dir().join("inventory.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    /// `{base_url}/api/`, ready for joining resource paths onto.
    pub fn api_base(&self) -> SyncResult<Url> {
        let root = format!("{}/api/", self.base_url.trim_end_matches('/'));
        Ok(Url::parse(&root)?)
    }

    /// Token file path, or `None` if no home directory can be found.
    pub fn token_file_path(&self) -> Option<PathBuf> {
        self.token_file.clone().or_else(|| {
            directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(TOKEN_FILE_NAME))
        })
    }

    /// Directory for the `jsonfile` cache backend.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_connection.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "drf-inventory")
                .map(|dirs| dirs.cache_dir().to_path_buf())
        })
    }

    /// `None` when entries never expire.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_timeout > 0).then(|| Duration::from_secs(self.cache_timeout))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Name of the configuration source used in error messages.
    pub fn source_name(&self) -> String {
        self.source
            .as_deref()
            .map(Path::display)
            .map(|d| d.to_string())
            .unwrap_or_else(|| "<inline config>".to_string())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
