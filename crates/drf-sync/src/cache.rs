//! # Response Cache
//!
//! Maps a stable key to a previously fetched API payload.
//!
//! ## Read/Write Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cache option   forced refresh   read cache?   write after fetch?      │
//! │  ────────────   ──────────────   ───────────   ──────────────────      │
//! │  false          any              no            no                      │
//! │  true           no               yes           yes (on miss)           │
//! │  true           yes              no            yes                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Format
//! `{plugin}_{customer}_{sha256(plugin)[..5]}s_{sha256(url)[..5]}`

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drf_core::PLUGIN_NAME;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use url::Url;

use crate::config::{CachePlugin, InventoryConfig};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Backend Trait
// =============================================================================

/// A cache backend.
///
/// `get` never fails: corrupt or expired entries are misses. `set` is an
/// unconditional overwrite.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, payload: &Value) -> SyncResult<()>;
}

/// What a backend stores per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    written_at: DateTime<Utc>,
    payload: Value,
}

impl CacheEntry {
    fn new(payload: Value) -> Self {
        CacheEntry {
            written_at: Utc::now(),
            payload,
        }
    }

    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        let Some(ttl) = ttl else {
            return true;
        };
        // Negative ages (clock went backwards) count as fresh.
        Utc::now()
            .signed_duration_since(self.written_at)
            .to_std()
            .map(|age| age < ttl)
            .unwrap_or(true)
    }
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-process cache. Lives as long as the run.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        MemoryCache {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn insert(&self, key: &str, entry: CacheEntry) -> SyncResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SyncError::Io("memory cache lock poisoned".into()))?;
        entries.insert(key.to_string(), entry);
        Ok(())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.payload.clone())
    }

    fn set(&self, key: &str, payload: &Value) -> SyncResult<()> {
        self.insert(key, CacheEntry::new(payload.clone()))
    }
}

// =============================================================================
// JSON File Backend
// =============================================================================

/// One `{written_at, payload}` JSON document per key.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        JsonFileCache {
            dir: dir.into(),
            ttl,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn write_entry(&self, key: &str, entry: &CacheEntry) -> SyncResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut file, entry).map_err(std::io::Error::from)?;
        file.flush()?;
        file.persist(self.entry_path(key))?;
        Ok(())
    }
}

impl CacheStore for JsonFileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CacheEntry>(&contents) {
            Ok(entry) if entry.is_fresh(self.ttl) => Some(entry.payload),
            Ok(_) => {
                debug!(?path, "Cache entry expired");
                None
            }
            Err(e) => {
                debug!(?path, error = %e, "Ignoring corrupt cache entry");
                None
            }
        }
    }

    fn set(&self, key: &str, payload: &Value) -> SyncResult<()> {
        self.write_entry(key, &CacheEntry::new(payload.clone()))
    }
}

// =============================================================================
// Cache Manager
// =============================================================================

/// Derives cache keys and applies the read/write policy.
pub struct CacheManager {
    store: Box<dyn CacheStore>,
    enabled: bool,
    force_refresh: bool,
    customer_id: i64,
}

impl CacheManager {
    pub fn new(store: Box<dyn CacheStore>, enabled: bool, customer_id: i64) -> Self {
        CacheManager {
            store,
            enabled,
            force_refresh: false,
            customer_id,
        }
    }

    /// Builds the backend named by `cache_plugin`.
    pub fn from_config(config: &InventoryConfig) -> SyncResult<Self> {
        let ttl = config.cache_ttl();
        let store: Box<dyn CacheStore> = match config.cache_plugin {
            CachePlugin::Memory => Box::new(MemoryCache::new(ttl)),
            CachePlugin::Jsonfile => {
                let dir = config.cache_dir().ok_or_else(|| {
                    SyncError::Config("cache_connection is required for the jsonfile cache".into())
                })?;
                Box::new(JsonFileCache::new(dir, ttl))
            }
        };
        Ok(Self::new(store, config.cache, config.customer_id))
    }

    /// Skip cache reads (writes still happen).
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn key_for(&self, url: &Url) -> String {
        cache_key(PLUGIN_NAME, self.customer_id, url.as_str())
    }

    /// Cached payload, if reading is allowed and the entry is live.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        if !self.enabled || self.force_refresh {
            return None;
        }
        self.store.get(key)
    }

    /// Writes through when caching is enabled. Failures are logged only.
    pub fn store(&self, key: &str, payload: &Value) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.store.set(key, payload) {
            warn!(key, error = %e, "Could not write cache entry");
        }
    }
}

/// `{plugin}_{customer}_{prefix}` with a short fingerprint of both names.
pub fn cache_key(plugin: &str, customer_id: i64, resource: &str) -> String {
    format!(
        "{}_{}_{}s_{}",
        plugin,
        customer_id,
        fingerprint(plugin),
        fingerprint(resource)
    )
}

fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)[..5].to_string()
}
