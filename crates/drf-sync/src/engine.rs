//! # Inventory Run
//!
//! One run of the inventory source: fetch, set the `all` constants,
//! materialize every server.
//!
//! ## Run Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          InventoryRun::execute()                        │
//! │                                                                         │
//! │  ┌──────────────┐    try_join!    ┌─────────────────────────────────┐  │
//! │  │ ResourceFetch│───────────────► │ customers/{id}/                 │  │
//! │  │              │                 │ operating-systems/              │  │
//! │  │              │                 │ servers/?customer_id={id}       │  │
//! │  └──────┬───────┘                 └─────────────────────────────────┘  │
//! │         │ Snapshot                                                      │
//! │         ▼                                                               │
//! │  all: django_drf_url, django_drf_token, customer                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Materializer ──► InventorySink   (errors ──► SyncError::Parse)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use drf_core::{Evaluator, InventorySink, MaterializeReport, Materializer, ALL_GROUP};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{CredentialProvider, TokenLifecycle};
use crate::cache::CacheManager;
use crate::client::ApiClient;
use crate::config::InventoryConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::ResourceFetcher;
use crate::token_store::TokenStore;

/// Per-run switches that do not belong in the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Ignore cached payloads (they are still rewritten).
    pub refresh_cache: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub customer_id: i64,
    pub report: MaterializeReport,
    /// How many of the three resources came from the cache.
    pub cache_hits: usize,
    pub elapsed_ms: u128,
}

/// Explicit context for one inventory run.
pub struct InventoryRun<E: Evaluator> {
    config: InventoryConfig,
    auth: Arc<TokenLifecycle>,
    fetcher: ResourceFetcher,
    evaluator: E,
}

impl<E: Evaluator> InventoryRun<E> {
    /// Wires client, token lifecycle, cache and fetcher from `config`.
    pub fn new(
        config: InventoryConfig,
        credentials: Arc<dyn CredentialProvider>,
        evaluator: E,
        options: RunOptions,
    ) -> SyncResult<Self> {
        config.validate()?;

        let client = ApiClient::new(&config)?;
        let store = config.token_file_path().map(TokenStore::new);
        if store.is_none() {
            warn!("No home directory found, tokens will not be persisted");
        }

        let auth = Arc::new(TokenLifecycle::new(client.clone(), credentials, store));
        let cache = CacheManager::from_config(&config)?.with_force_refresh(options.refresh_cache);
        let fetcher = ResourceFetcher::new(client, Arc::clone(&auth), cache);

        Ok(InventoryRun {
            config,
            auth,
            fetcher,
            evaluator,
        })
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn auth(&self) -> &TokenLifecycle {
        &self.auth
    }

    /// Runs fetch and materialization into `sink`.
    pub async fn execute<S: InventorySink + ?Sized>(&self, sink: &mut S) -> SyncResult<RunSummary> {
        let started = Instant::now();
        let customer_id = self.config.customer_id;
        info!(customer_id, base_url = %self.config.base_url, "Starting inventory run");

        let snapshot = self.fetcher.fetch_snapshot(customer_id).await?;
        debug!(
            servers = snapshot.servers.len(),
            operating_systems = snapshot.operating_systems.len(),
            cache_hits = snapshot.cache_hits,
            "Resources fetched"
        );

        // A fully cached run may never have logged in.
        let access = self.auth.access_token().await?;
        let customer = serde_json::to_value(&snapshot.customer).map_err(|e| SyncError::Record {
            resource: "customer".to_string(),
            message: e.to_string(),
        })?;

        sink.set_group_variable(
            ALL_GROUP,
            "django_drf_url",
            Value::String(self.config.base_url.clone()),
        );
        sink.set_group_variable(ALL_GROUP, "django_drf_token", Value::String(access));
        sink.set_group_variable(ALL_GROUP, "customer", customer);

        let report = Materializer::new(&self.config.rules, &self.evaluator)
            .materialize(&snapshot.servers, &snapshot.operating_systems, sink)
            .map_err(|source| SyncError::Parse {
                source_name: self.config.source_name(),
                source,
            })?;

        for overwritten in &report.overwritten {
            warn!(
                ip = %overwritten.ip,
                previous_server = overwritten.previous_server,
                server = overwritten.server,
                "Duplicate server IP, later server overwrites earlier host"
            );
        }
        for skipped in &report.skipped {
            debug!(
                host = %skipped.host,
                rule = %skipped.kind,
                name = %skipped.name,
                error = %skipped.message,
                "Skipped failing expression"
            );
        }

        let summary = RunSummary {
            customer_id,
            cache_hits: snapshot.cache_hits,
            elapsed_ms: started.elapsed().as_millis(),
            report,
        };
        info!(
            hosts = summary.report.servers,
            skipped = summary.report.skipped.len(),
            overwritten = summary.report.overwritten.len(),
            cache_hits = summary.cache_hits,
            elapsed_ms = summary.elapsed_ms as u64,
            "Inventory run complete"
        );
        Ok(summary)
    }
}
