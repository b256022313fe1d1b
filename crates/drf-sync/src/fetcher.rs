//! # Remote Resource Fetcher
//!
//! Cache-aware, authenticated resource GETs.
//!
//! ## Fetch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  fetch("servers/?customer_id=7")                                       │
//! │                                                                         │
//! │  1. resolve against {base_url}/api/, derive cache key                  │
//! │  2. cache lookup (only if cache on and not forced)                     │
//! │  3. first fetch of the run: best-effort token refresh                  │
//! │  4. miss ──► access_token() ──► GET                                    │
//! │                 │                                                       │
//! │                 └─ 401 ──► recover_from_rejection ──► GET once more    │
//! │  5. write payload to cache (if cache on)                               │
//! │  6. unwrap {"data": ...} envelope                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use drf_core::{Customer, OperatingSystem, Server};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::auth::TokenLifecycle;
use crate::cache::CacheManager;
use crate::client::ApiClient;
use crate::error::{SyncError, SyncResult};

/// The three records one run works from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub customer: Customer,
    pub operating_systems: Vec<OperatingSystem>,
    pub servers: Vec<Server>,
    /// Resources answered from the cache instead of the network.
    pub cache_hits: usize,
}

/// Where a payload came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub value: Value,
    pub from_cache: bool,
}

pub struct ResourceFetcher {
    client: ApiClient,
    auth: Arc<TokenLifecycle>,
    cache: CacheManager,
    warm_up: OnceCell<()>,
}

impl ResourceFetcher {
    pub fn new(client: ApiClient, auth: Arc<TokenLifecycle>, cache: CacheManager) -> Self {
        ResourceFetcher {
            client,
            auth,
            cache,
            warm_up: OnceCell::new(),
        }
    }

    /// Fetches a resource path and returns its unwrapped payload.
    pub async fn fetch(&self, path: &str) -> SyncResult<Value> {
        self.fetch_tracked(path).await.map(|f| f.value)
    }

    /// Like [`fetch`](Self::fetch), also reporting whether the cache answered.
    pub async fn fetch_tracked(&self, path: &str) -> SyncResult<Fetched> {
        let url = self.client.resolve(path)?;
        let key = self.cache.key_for(&url);
        let cached = self.cache.lookup(&key);

        self.warm_up
            .get_or_init(|| async { self.auth.try_refresh().await })
            .await;

        let (payload, from_cache) = match cached {
            Some(payload) => {
                debug!(%url, "Cache hit");
                (payload, true)
            }
            None => {
                info!(%url, "Fetching");
                let payload = self.fetch_live(&url).await?;
                self.cache.store(&key, &payload);
                (payload, false)
            }
        };

        Ok(Fetched {
            value: unwrap_envelope(payload),
            from_cache,
        })
    }

    /// GET with a single 401 recovery.
    async fn fetch_live(&self, url: &Url) -> SyncResult<Value> {
        let access = self.auth.access_token().await?;
        match self.client.get(url, &access).await {
            Err(SyncError::Unauthorized { .. }) => {
                self.auth.recover_from_rejection(&access).await?;
                let access = self.auth.access_token().await?;
                self.client.get(url, &access).await
            }
            other => other,
        }
    }

    // =========================================================================
    // Typed Resources
    // =========================================================================

    pub async fn fetch_customer(&self, customer_id: i64) -> SyncResult<Fetched> {
        self.fetch_tracked(&format!("customers/{}/", customer_id)).await
    }

    pub async fn fetch_operating_systems(&self) -> SyncResult<Fetched> {
        self.fetch_tracked("operating-systems/").await
    }

    pub async fn fetch_servers(&self, customer_id: i64) -> SyncResult<Fetched> {
        self.fetch_tracked(&format!("servers/?customer_id={}", customer_id))
            .await
    }

    /// Fetches customer, OS catalog and servers concurrently.
    pub async fn fetch_snapshot(&self, customer_id: i64) -> SyncResult<Snapshot> {
        let (customer, operating_systems, servers) = tokio::try_join!(
            self.fetch_customer(customer_id),
            self.fetch_operating_systems(),
            self.fetch_servers(customer_id),
        )?;

        let cache_hits = [&customer, &operating_systems, &servers]
            .iter()
            .filter(|f| f.from_cache)
            .count();

        Ok(Snapshot {
            customer: decode_record("customer", customer.value)?,
            operating_systems: decode_record("operating system", operating_systems.value)?,
            servers: decode_record("server", servers.value)?,
            cache_hits,
        })
    }
}

/// Returns `payload["data"]` when present, otherwise the payload itself.
pub fn unwrap_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_record<T: DeserializeOwned>(resource: &str, value: Value) -> SyncResult<T> {
    serde_json::from_value(value).map_err(|e| SyncError::Record {
        resource: resource.to_string(),
        message: e.to_string(),
    })
}
